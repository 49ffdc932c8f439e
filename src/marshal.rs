//! Rendering of scheme records into crypt(3) hash strings.

use crate::error::{Error, Result};
use crate::schema::{self, Field, FieldKind, FieldValue, Record, Schema};

/// Renders a scheme record into its hash string.
///
/// The prefix field is always rendered first. Fields marked `omitempty`
/// are skipped while empty. The separator before a field depends on the
/// previous rendered one: nothing after an inline field, `,` between two
/// grouped params, `$` otherwise.
pub fn marshal<T: Record>(record: &T) -> Result<String> {
    let schema = schema::of::<T>()?;
    let mut out = Vec::new();
    if let Some(prefix) = &schema.prefix {
        out.extend_from_slice(&render(record, &schema, prefix)?);
    }
    let mut prev: Option<&Field<T>> = None;
    for field in &schema.fields {
        if field.opts.omit_empty && is_empty(record, field) {
            continue;
        }
        match prev {
            Some(p) if p.opts.inline => {}
            Some(p) if p.opts.group && field.opts.group => out.push(b','),
            Some(_) => out.push(b'$'),
            None => {}
        }
        if let Some(param) = field.opts.param {
            out.extend_from_slice(param.as_bytes());
            out.push(b'=');
        }
        out.extend_from_slice(&render(record, &schema, field)?);
        prev = Some(field);
    }
    String::from_utf8(out).map_err(|_| Error::Marshal {
        type_name: schema.type_name,
        field: "",
        msg: "invalid character".to_string(),
    })
}

fn is_empty<T>(record: &T, field: &Field<T>) -> bool {
    if let Some(empty) = &field.empty {
        return empty(record);
    }
    match &field.get {
        Some(get) => get(record).is_empty(),
        None => false,
    }
}

fn render<T>(record: &T, schema: &Schema<T>, field: &Field<T>) -> Result<Vec<u8>> {
    let fail = |msg: String| Error::Marshal {
        type_name: schema.type_name,
        field: field.name,
        msg,
    };
    if field.opts.prefix && !matches!(field.kind, FieldKind::Str | FieldKind::Text) {
        return Err(fail("unsupported type".to_string()));
    }
    let text = match field.kind {
        FieldKind::Text => match &field.encode {
            Some(encode) => encode(record).map_err(&fail)?.into_bytes(),
            None => Vec::new(),
        },
        _ => match field.get.as_ref().map(|get| get(record)) {
            Some(FieldValue::Bytes(b)) => b,
            Some(FieldValue::Uint(v)) => format_radix(v, field.opts.base).into_bytes(),
            Some(FieldValue::Str(s)) => s.into_bytes(),
            None => return Err(fail("unsupported type".to_string())),
        },
    };
    if field.opts.length > 0 && text.len() != field.opts.length {
        return Err(fail("length mismatch".to_string()));
    }
    if let Some(enc) = field.opts.encoding {
        if let Some(i) = enc.index_any_invalid(&text) {
            return Err(fail(format!("invalid character '{}'", text[i] as char)));
        }
    }
    Ok(text)
}

/// Formats an unsigned integer in the given radix with lowercase digits.
fn format_radix(mut v: u64, base: u32) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if v == 0 {
        return "0".to_string();
    }
    let mut buf = Vec::new();
    while v > 0 {
        buf.push(DIGITS[(v % base as u64) as usize]);
        v /= base as u64;
    }
    buf.iter().rev().map(|&b| b as char).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaBuilder;

    #[derive(Default)]
    struct Scheme {
        prefix: String,
        memory: u32,
        time: u32,
        threads: u32,
        salt: Vec<u8>,
        sum: Vec<u8>,
    }

    impl Record for Scheme {
        fn describe(b: &mut SchemaBuilder<Self>) {
            b.string("prefix", "", |s| &s.prefix, |s| &mut s.prefix);
            b.uint32("memory", "param:m,group", |s| s.memory, |s, v| s.memory = v);
            b.uint32("time", "param:t,group", |s| s.time, |s, v| s.time = v);
            b.uint32("threads", "param:p,group", |s| s.threads, |s, v| s.threads = v);
            b.bytes("salt", "", |s| &s.salt, |s| &mut s.salt);
            b.bytes("sum", "", |s| &s.sum, |s| &mut s.sum);
        }
    }

    fn scheme() -> Scheme {
        Scheme {
            prefix: "$test$".to_string(),
            memory: 512,
            time: 2,
            threads: 1,
            salt: b"somesalt".to_vec(),
            sum: b"abcdef".to_vec(),
        }
    }

    #[test]
    fn joins_groups_and_fragments() {
        assert_eq!(marshal(&scheme()).unwrap(), "$test$m=512,t=2,p=1$somesalt$abcdef");
    }

    #[test]
    fn rejects_invalid_characters() {
        let mut s = scheme();
        s.salt = b"some@salt".to_vec();
        assert_eq!(
            marshal(&s).unwrap_err(),
            Error::Marshal {
                type_name: "Scheme",
                field: "salt",
                msg: "invalid character '@'".to_string(),
            }
        );
    }

    #[derive(Default)]
    struct Sized {
        prefix: String,
        salt: Vec<u8>,
        sum: [u8; 4],
    }

    impl Record for Sized {
        fn describe(b: &mut SchemaBuilder<Self>) {
            b.string("prefix", "", |s| &s.prefix, |s| &mut s.prefix);
            b.bytes("salt", "length:2,inline", |s| &s.salt, |s| &mut s.salt);
            b.byte_array("sum", "", |s| &s.sum, |s| &mut s.sum);
        }
    }

    #[test]
    fn inline_fields_join_without_separator() {
        let s = Sized {
            prefix: String::new(),
            salt: b"ab".to_vec(),
            sum: *b"cdef",
        };
        assert_eq!(marshal(&s).unwrap(), "abcdef");
    }

    #[test]
    fn enforces_length() {
        let s = Sized {
            prefix: String::new(),
            salt: b"abc".to_vec(),
            sum: *b"cdef",
        };
        assert_eq!(
            marshal(&s).unwrap_err(),
            Error::Marshal {
                type_name: "Sized",
                field: "salt",
                msg: "length mismatch".to_string(),
            }
        );
    }

    #[test]
    fn radix_formatting() {
        assert_eq!(format_radix(0, 10), "0");
        assert_eq!(format_radix(255, 16), "ff");
        assert_eq!(format_radix(5001, 10), "5001");
    }
}
