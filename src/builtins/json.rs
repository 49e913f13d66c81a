//! JSON Extension - RFC 8259 bridge over the value model
//!
//! - `json_encode()` - Serialize values to JSON text
//! - `json_decode()` - Parse JSON text into arrays or `stdClass` objects
//! - `json_last_error()` / `json_last_error_msg()` - Last error of either call
//! - `json_validate()` - Syntax and depth check without building values
//!
//! Encoding walks `Val` directly; decoding parses with `serde_json` (with
//! `preserve_order`, so object members keep document order) and converts the
//! tree. The error of the last call is kept in the `RequestContext`.
//!
//! # References
//!
//! - PHP Source: $PHP_SRC_PATH/ext/json/json.c
//! - Zend Encoder: $PHP_SRC_PATH/ext/json/json_encoder.c
//! - Zend Parser: $PHP_SRC_PATH/ext/json/json_parser.y

use crate::core::array::{ArrayData, ArrayKey};
use crate::core::convert::{canonical_int_key, format_float, format_float_repr};
use crate::core::string::PhpString;
use crate::core::value::Val;
use crate::runtime::context::{CoreConfig, RequestContext};
use crate::runtime::object::Object;
use serde_json::Value as JsonValue;
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

pub const JSON_HEX_TAG: i64 = 1;
pub const JSON_HEX_AMP: i64 = 2;
pub const JSON_HEX_APOS: i64 = 4;
pub const JSON_HEX_QUOT: i64 = 8;
pub const JSON_FORCE_OBJECT: i64 = 16;
pub const JSON_UNESCAPED_SLASHES: i64 = 64;
pub const JSON_PRETTY_PRINT: i64 = 128;
pub const JSON_UNESCAPED_UNICODE: i64 = 256;
pub const JSON_PRESERVE_ZERO_FRACTION: i64 = 1024;
pub const JSON_UNESCAPED_LINE_TERMINATORS: i64 = 2048;
pub const JSON_OBJECT_AS_ARRAY: i64 = 1;
pub const JSON_BIGINT_AS_STRING: i64 = 2;

/// JSON error codes matching PHP constants
/// Reference: $PHP_SRC_PATH/ext/json/php_json.h
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JsonError {
    #[default]
    None = 0,
    Depth = 1,
    StateMismatch = 2,
    CtrlChar = 3,
    Syntax = 4,
    Utf8 = 5,
    Recursion = 6,
    InfOrNan = 7,
    UnsupportedType = 8,
    InvalidPropertyName = 9,
    Utf16 = 10,
}

impl JsonError {
    pub fn code(self) -> i64 {
        self as i64
    }

    pub fn message(self) -> &'static str {
        match self {
            JsonError::None => "No error",
            JsonError::Depth => "Maximum stack depth exceeded",
            JsonError::StateMismatch => "State mismatch (invalid or malformed JSON)",
            JsonError::CtrlChar => "Control character error, possibly incorrectly encoded",
            JsonError::Syntax => "Syntax error",
            JsonError::Utf8 => "Malformed UTF-8 characters, possibly incorrectly encoded",
            JsonError::Recursion => "Recursion detected",
            JsonError::InfOrNan => "Inf and NaN cannot be JSON encoded",
            JsonError::UnsupportedType => "Type is not supported",
            JsonError::InvalidPropertyName => "The decoded property name is invalid",
            JsonError::Utf16 => "Single unpaired UTF-16 surrogate in unicode escape",
        }
    }
}

impl fmt::Display for JsonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for JsonError {}

/// Encoding flags
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonEncodeOptions {
    pub hex_tag: bool,
    pub hex_amp: bool,
    pub hex_apos: bool,
    pub hex_quot: bool,
    pub force_object: bool,
    pub unescaped_slashes: bool,
    pub pretty_print: bool,
    pub unescaped_unicode: bool,
    pub preserve_zero_fraction: bool,
    pub unescaped_line_terminators: bool,
}

impl JsonEncodeOptions {
    pub fn from_flags(flags: i64) -> Self {
        Self {
            hex_tag: flags & JSON_HEX_TAG != 0,
            hex_amp: flags & JSON_HEX_AMP != 0,
            hex_apos: flags & JSON_HEX_APOS != 0,
            hex_quot: flags & JSON_HEX_QUOT != 0,
            force_object: flags & JSON_FORCE_OBJECT != 0,
            unescaped_slashes: flags & JSON_UNESCAPED_SLASHES != 0,
            pretty_print: flags & JSON_PRETTY_PRINT != 0,
            unescaped_unicode: flags & JSON_UNESCAPED_UNICODE != 0,
            preserve_zero_fraction: flags & JSON_PRESERVE_ZERO_FRACTION != 0,
            unescaped_line_terminators: flags & JSON_UNESCAPED_LINE_TERMINATORS != 0,
        }
    }
}

/// Encoder state with recursion tracking
/// Reference: $PHP_SRC_PATH/ext/json/json_encoder.c - php_json_encode_zval
struct EncodeContext<'a> {
    config: &'a CoreConfig,
    options: JsonEncodeOptions,
    depth: usize,
    max_depth: usize,
    /// Arrays (by address) and objects (by id) currently being encoded
    visiting: HashSet<(bool, u64)>,
    out: String,
}

impl<'a> EncodeContext<'a> {
    fn new(config: &'a CoreConfig, options: JsonEncodeOptions, max_depth: usize) -> Self {
        Self {
            config,
            options,
            depth: 0,
            max_depth,
            visiting: HashSet::new(),
            out: String::new(),
        }
    }

    fn encode_value(&mut self, value: &Val) -> Result<(), JsonError> {
        match value {
            Val::Undefined | Val::Null => self.out.push_str("null"),
            Val::Bool(b) => self.out.push_str(if *b { "true" } else { "false" }),
            Val::Int(i) => self.out.push_str(&i.to_string()),
            Val::Float(f) => self.encode_float(*f)?,
            Val::String(s) => self.encode_string(s.as_bytes())?,
            Val::Array(arr) => {
                let marker = (false, Rc::as_ptr(arr) as usize as u64);
                self.enter(marker)?;
                let result = self.encode_array(&arr.borrow());
                self.leave(marker);
                result?
            }
            Val::Object(obj) => {
                let obj = obj.borrow();
                let marker = (true, obj.id());
                self.enter(marker)?;
                let members: Vec<(ArrayKey, Val)> = obj
                    .public_properties()
                    .map(|(name, value)| (ArrayKey::Str(PhpString::from(name)), value))
                    .collect();
                let result = self.encode_members(members.iter().map(|(k, v)| (k.clone(), v)), true);
                self.leave(marker);
                result?
            }
            Val::Resource(_) => return Err(JsonError::UnsupportedType),
            Val::Reference(slot) => self.encode_value(&slot.borrow())?,
        }
        Ok(())
    }

    fn enter(&mut self, marker: (bool, u64)) -> Result<(), JsonError> {
        if !self.visiting.insert(marker) {
            return Err(JsonError::Recursion);
        }
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(JsonError::Depth);
        }
        Ok(())
    }

    fn leave(&mut self, marker: (bool, u64)) {
        self.visiting.remove(&marker);
        self.depth -= 1;
    }

    fn encode_float(&mut self, f: f64) -> Result<(), JsonError> {
        if !f.is_finite() {
            return Err(JsonError::InfOrNan);
        }
        let mut text = match self.config.serialize_precision {
            p if p < 0 => format_float_repr(f, 'e'),
            0 => format_float(f, 1),
            p => format_float(f, p as usize).replace('E', "e"),
        };
        if self.options.preserve_zero_fraction && !text.contains(|c: char| c == '.' || c == 'e') {
            text.push_str(".0");
        }
        self.out.push_str(&text);
        Ok(())
    }

    fn encode_string(&mut self, bytes: &[u8]) -> Result<(), JsonError> {
        let s = std::str::from_utf8(bytes).map_err(|_| JsonError::Utf8)?;
        let opts = self.options;
        let out = &mut self.out;
        out.reserve(s.len() + 2);
        out.push('"');
        for ch in s.chars() {
            match ch {
                '"' if opts.hex_quot => out.push_str("\\u0022"),
                '"' => out.push_str("\\\""),
                '\\' => out.push_str("\\\\"),
                '/' if !opts.unescaped_slashes => out.push_str("\\/"),
                '\x08' => out.push_str("\\b"),
                '\x0C' => out.push_str("\\f"),
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                '<' if opts.hex_tag => out.push_str("\\u003C"),
                '>' if opts.hex_tag => out.push_str("\\u003E"),
                '&' if opts.hex_amp => out.push_str("\\u0026"),
                '\'' if opts.hex_apos => out.push_str("\\u0027"),
                c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
                '\u{2028}' | '\u{2029}'
                    if opts.unescaped_unicode && !opts.unescaped_line_terminators =>
                {
                    out.push_str(&format!("\\u{:04x}", ch as u32))
                }
                c if !opts.unescaped_unicode && !c.is_ascii() => {
                    let mut units = [0u16; 2];
                    for unit in c.encode_utf16(&mut units) {
                        out.push_str(&format!("\\u{:04x}", unit));
                    }
                }
                c => out.push(c),
            }
        }
        out.push('"');
        Ok(())
    }

    fn encode_array(&mut self, arr: &ArrayData) -> Result<(), JsonError> {
        let as_object = self.options.force_object || !arr.is_list();
        self.encode_members(arr.iter(), as_object)
    }

    fn newline(&mut self) {
        if self.options.pretty_print {
            self.out.push('\n');
            for _ in 1..self.depth {
                self.out.push_str("    ");
            }
        }
    }

    fn encode_members<'v>(
        &mut self,
        members: impl Iterator<Item = (ArrayKey, &'v Val)>,
        as_object: bool,
    ) -> Result<(), JsonError> {
        self.out.push(if as_object { '{' } else { '[' });
        let mut empty = true;
        for (key, value) in members {
            if !empty {
                self.out.push(',');
            }
            empty = false;
            // members sit one level deeper than the brackets
            self.depth += 1;
            self.newline();
            self.depth -= 1;
            if as_object {
                match &key {
                    ArrayKey::Int(i) => self.encode_string(i.to_string().as_bytes())?,
                    ArrayKey::Str(s) => self.encode_string(s.as_bytes())?,
                }
                self.out.push(':');
                if self.options.pretty_print {
                    self.out.push(' ');
                }
            }
            self.encode_value(value)?;
        }
        if !empty {
            self.newline();
        }
        self.out.push(if as_object { '}' } else { ']' });
        Ok(())
    }
}

/// json_encode(mixed $value, int $flags = 0, int $depth = 512): string|false
/// Reference: $PHP_SRC_PATH/ext/json/json.c - PHP_FUNCTION(json_encode)
pub fn json_encode(
    ctx: &mut RequestContext,
    value: &Val,
    flags: i64,
    depth: Option<usize>,
) -> Result<PhpString, JsonError> {
    let max_depth = depth.unwrap_or(ctx.config.max_json_depth);
    let mut encoder = EncodeContext::new(&ctx.config, JsonEncodeOptions::from_flags(flags), max_depth);
    let result = encoder.encode_value(value).map(|()| PhpString::from(encoder.out));
    ctx.json_last_error = result.as_ref().err().copied().unwrap_or(JsonError::None);
    result
}

fn classify(err: &serde_json::Error) -> JsonError {
    let text = err.to_string();
    if text.contains("recursion limit") {
        JsonError::Depth
    } else if text.contains("control character") {
        JsonError::CtrlChar
    } else if text.contains("surrogate") || text.contains("hex escape") {
        JsonError::Utf16
    } else {
        JsonError::Syntax
    }
}

fn parse(text: &[u8], max_depth: usize) -> Result<JsonValue, JsonError> {
    let text = std::str::from_utf8(text).map_err(|_| JsonError::Utf8)?;
    let value: JsonValue = serde_json::from_str(text).map_err(|e| classify(&e))?;
    if nesting(&value) > max_depth {
        return Err(JsonError::Depth);
    }
    Ok(value)
}

/// Array/object nesting of a parsed document (scalars are 0)
fn nesting(value: &JsonValue) -> usize {
    match value {
        JsonValue::Array(items) => 1 + items.iter().map(nesting).max().unwrap_or(0),
        JsonValue::Object(members) => 1 + members.values().map(nesting).max().unwrap_or(0),
        _ => 0,
    }
}

struct Decoder<'a> {
    ctx: &'a mut RequestContext,
    assoc: bool,
    bigint_as_string: bool,
}

impl Decoder<'_> {
    fn key(&mut self, name: &str) -> ArrayKey {
        match canonical_int_key(name.as_bytes()) {
            Some(i) => ArrayKey::Int(i),
            None => ArrayKey::Str(self.ctx.intern(name.as_bytes())),
        }
    }

    fn convert(&mut self, value: &JsonValue) -> Result<Val, JsonError> {
        Ok(match value {
            JsonValue::Null => Val::Null,
            JsonValue::Bool(b) => Val::Bool(*b),
            JsonValue::Number(n) => match (n.as_i64(), n.as_u64()) {
                (Some(i), _) => Val::Int(i),
                (None, Some(u)) if self.bigint_as_string => Val::string(u.to_string()),
                _ => Val::Float(n.as_f64().unwrap_or(0.0)),
            },
            JsonValue::String(s) => Val::string(s.as_str()),
            JsonValue::Array(items) => {
                let list = items
                    .iter()
                    .map(|item| self.convert(item))
                    .collect::<Result<Vec<_>, _>>()?;
                Val::array(ArrayData::from_list(list))
            }
            JsonValue::Object(members) if self.assoc => {
                let mut arr = ArrayData::with_capacity(members.len());
                for (name, member) in members {
                    let key = self.key(name);
                    let value = self.convert(member)?;
                    arr.set(key, value);
                }
                Val::array(arr)
            }
            JsonValue::Object(members) => {
                let std_class = self
                    .ctx
                    .classes
                    .get("stdClass")
                    .ok_or(JsonError::UnsupportedType)?;
                let mut obj = Object::instantiate(&std_class).map_err(|_| JsonError::UnsupportedType)?;
                for (name, member) in members {
                    if name.starts_with('\0') {
                        return Err(JsonError::InvalidPropertyName);
                    }
                    let value = self.convert(member)?;
                    obj.set_property(name, value, None)
                        .map_err(|_| JsonError::InvalidPropertyName)?;
                }
                Val::object(obj)
            }
        })
    }
}

/// json_decode(string $json, ?bool $assoc = null, int $depth = 512, int $flags = 0): mixed
/// Reference: $PHP_SRC_PATH/ext/json/json.c - PHP_FUNCTION(json_decode)
pub fn json_decode(
    ctx: &mut RequestContext,
    text: &[u8],
    assoc: bool,
    depth: Option<usize>,
    flags: i64,
) -> Result<Val, JsonError> {
    let max_depth = depth.unwrap_or(ctx.config.max_json_depth);
    let result = parse(text, max_depth).and_then(|tree| {
        let mut decoder = Decoder {
            ctx: &mut *ctx,
            assoc: assoc || flags & JSON_OBJECT_AS_ARRAY != 0,
            bigint_as_string: flags & JSON_BIGINT_AS_STRING != 0,
        };
        decoder.convert(&tree)
    });
    ctx.json_last_error = result.as_ref().err().copied().unwrap_or(JsonError::None);
    result
}

/// json_validate(string $json, int $depth = 512): bool
pub fn json_validate(ctx: &mut RequestContext, text: &[u8], depth: Option<usize>) -> bool {
    let max_depth = depth.unwrap_or(ctx.config.max_json_depth);
    let result = parse(text, max_depth);
    ctx.json_last_error = result.as_ref().err().copied().unwrap_or(JsonError::None);
    result.is_ok()
}

pub fn json_last_error(ctx: &RequestContext) -> i64 {
    ctx.json_last_error.code()
}

pub fn json_last_error_msg(ctx: &RequestContext) -> &'static str {
    ctx.json_last_error.message()
}
