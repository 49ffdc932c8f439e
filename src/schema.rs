//! Compilation of scheme descriptions into field schemas.
//!
//! A scheme type implements [`Record`] and registers its fields in hash
//! string order with a [`SchemaBuilder`]. The builder output is compiled
//! once into a [`Schema`]: tags are parsed, invariants checked, parameter
//! duplicates resolved, and the result cached process-wide by [`TypeId`].
//! Concurrent first compilations of the same type may race; both produce
//! identical schemas, so last-write-wins insertion is harmless.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

use crate::encoding::{Alphabet, BASE64, HASH64};
use crate::error::{Error, Result};

/// A scheme whose fields can be marshaled to and unmarshaled from a
/// crypt(3) hash string.
pub trait Record: Default + Sized + 'static {
    /// Registers the scheme's fields in hash string order.
    fn describe(b: &mut SchemaBuilder<Self>);
}

/// Typed view of a field value crossing the engine boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Bytes(Vec<u8>),
    Uint(u64),
    Str(String),
}

impl FieldValue {
    pub(crate) fn is_empty(&self) -> bool {
        match self {
            FieldValue::Bytes(b) => b.is_empty(),
            FieldValue::Uint(v) => *v == 0,
            FieldValue::Str(s) => s.is_empty(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FieldKind {
    Bytes,
    Uint,
    Str,
    /// Field with a custom text codec.
    Text,
}

/// Parsed field options.
pub(crate) struct FieldOptions {
    pub omit_empty: bool,
    pub group: bool,
    pub param: Option<&'static str>,
    pub encoding: Option<&'static Alphabet>,
    pub length: usize,
    pub inline: bool,
    pub base: u32,
    pub prefix: bool,
}

impl FieldOptions {
    fn defaults() -> Self {
        FieldOptions {
            omit_empty: false,
            group: false,
            param: None,
            encoding: Some(&HASH64),
            length: 0,
            inline: false,
            base: 10,
            prefix: false,
        }
    }
}

type GetFn<T> = Box<dyn Fn(&T) -> FieldValue + Send + Sync>;
type SetFn<T> = Box<dyn Fn(&mut T, FieldValue) + Send + Sync>;
type EncodeFn<T> = Box<dyn Fn(&T) -> std::result::Result<String, String> + Send + Sync>;
type DecodeFn<T> = Box<dyn Fn(&mut T, &str) -> std::result::Result<(), String> + Send + Sync>;
type EmptyFn<T> = Box<dyn Fn(&T) -> bool + Send + Sync>;

struct RawField<T> {
    name: &'static str,
    tag: &'static str,
    index: Vec<usize>,
    kind: FieldKind,
    bits: u32,
    derived_len: usize,
    get: Option<GetFn<T>>,
    set: Option<SetFn<T>>,
    encode: Option<EncodeFn<T>>,
    decode: Option<DecodeFn<T>>,
    empty: Option<EmptyFn<T>>,
}

/// A compiled field of a scheme.
pub(crate) struct Field<T> {
    pub name: &'static str,
    pub tag: &'static str,
    pub index: Vec<usize>,
    pub kind: FieldKind,
    pub bits: u32,
    pub opts: FieldOptions,
    pub get: Option<GetFn<T>>,
    pub set: Option<SetFn<T>>,
    pub encode: Option<EncodeFn<T>>,
    pub decode: Option<DecodeFn<T>>,
    pub empty: Option<EmptyFn<T>>,
}

impl<T> Field<T> {
    /// Label used in "not found" error messages.
    pub(crate) fn describe(&self) -> &'static str {
        if self.opts.group {
            "grouped param"
        } else if self.opts.param.is_some() {
            "param"
        } else {
            "value"
        }
    }
}

/// A compiled scheme: its prefix field, value fields in hash string order,
/// and the number of required positional values.
pub(crate) struct Schema<T> {
    pub type_name: &'static str,
    pub prefix: Option<Field<T>>,
    pub fields: Vec<Field<T>>,
    pub required: usize,
}

impl<T> std::fmt::Debug for Schema<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Schema")
            .field("type_name", &self.type_name)
            .field("required", &self.required)
            .finish_non_exhaustive()
    }
}

/// Registers the fields of a scheme `T` in hash string order.
pub struct SchemaBuilder<T> {
    fields: Vec<RawField<T>>,
    pos: usize,
}

impl<T: Record> SchemaBuilder<T> {
    fn new() -> Self {
        SchemaBuilder {
            fields: Vec::new(),
            pos: 0,
        }
    }

    fn push(&mut self, mut field: RawField<T>) {
        field.index.insert(0, self.pos);
        self.pos += 1;
        self.fields.push(field);
    }

    /// Registers a variable-length byte field.
    pub fn bytes(
        &mut self,
        name: &'static str,
        tag: &'static str,
        get: impl Fn(&T) -> &Vec<u8> + Send + Sync + 'static,
        get_mut: impl Fn(&mut T) -> &mut Vec<u8> + Send + Sync + 'static,
    ) {
        self.push(RawField {
            name,
            tag,
            index: Vec::new(),
            kind: FieldKind::Bytes,
            bits: 0,
            derived_len: 0,
            get: Some(Box::new(move |t| FieldValue::Bytes(get(t).clone()))),
            set: Some(Box::new(move |t, v| {
                if let FieldValue::Bytes(b) = v {
                    *get_mut(t) = b;
                }
            })),
            encode: None,
            decode: None,
            empty: None,
        });
    }

    /// Registers a fixed-length byte field; the array length becomes the
    /// field's expected text length.
    pub fn byte_array<const N: usize>(
        &mut self,
        name: &'static str,
        tag: &'static str,
        get: impl Fn(&T) -> &[u8; N] + Send + Sync + 'static,
        get_mut: impl Fn(&mut T) -> &mut [u8; N] + Send + Sync + 'static,
    ) {
        self.push(RawField {
            name,
            tag,
            index: Vec::new(),
            kind: FieldKind::Bytes,
            bits: 0,
            derived_len: N,
            get: Some(Box::new(move |t| FieldValue::Bytes(get(t).to_vec()))),
            set: Some(Box::new(move |t, v| {
                if let FieldValue::Bytes(b) = v {
                    let arr = get_mut(t);
                    let n = b.len().min(N);
                    arr[..n].copy_from_slice(&b[..n]);
                }
            })),
            encode: None,
            decode: None,
            empty: None,
        });
    }

    /// Registers an unsigned integer field of the given bit width.
    fn uint(
        &mut self,
        name: &'static str,
        tag: &'static str,
        bits: u32,
        get: impl Fn(&T) -> u64 + Send + Sync + 'static,
        set: impl Fn(&mut T, u64) + Send + Sync + 'static,
    ) {
        self.push(RawField {
            name,
            tag,
            index: Vec::new(),
            kind: FieldKind::Uint,
            bits,
            derived_len: 0,
            get: Some(Box::new(move |t| FieldValue::Uint(get(t)))),
            set: Some(Box::new(move |t, v| {
                if let FieldValue::Uint(u) = v {
                    set(t, u);
                }
            })),
            encode: None,
            decode: None,
            empty: None,
        });
    }

    pub fn uint8(
        &mut self,
        name: &'static str,
        tag: &'static str,
        get: impl Fn(&T) -> u8 + Send + Sync + 'static,
        set: impl Fn(&mut T, u8) + Send + Sync + 'static,
    ) {
        self.uint(name, tag, 8, move |t| get(t) as u64, move |t, v| set(t, v as u8));
    }

    pub fn uint32(
        &mut self,
        name: &'static str,
        tag: &'static str,
        get: impl Fn(&T) -> u32 + Send + Sync + 'static,
        set: impl Fn(&mut T, u32) + Send + Sync + 'static,
    ) {
        self.uint(name, tag, 32, move |t| get(t) as u64, move |t, v| set(t, v as u32));
    }

    pub fn uint64(
        &mut self,
        name: &'static str,
        tag: &'static str,
        get: impl Fn(&T) -> u64 + Send + Sync + 'static,
        set: impl Fn(&mut T, u64) + Send + Sync + 'static,
    ) {
        self.uint(name, tag, 64, get, set);
    }

    /// Registers a string field.
    pub fn string(
        &mut self,
        name: &'static str,
        tag: &'static str,
        get: impl Fn(&T) -> &String + Send + Sync + 'static,
        get_mut: impl Fn(&mut T) -> &mut String + Send + Sync + 'static,
    ) {
        self.push(RawField {
            name,
            tag,
            index: Vec::new(),
            kind: FieldKind::Str,
            bits: 0,
            derived_len: 0,
            get: Some(Box::new(move |t| FieldValue::Str(get(t).clone()))),
            set: Some(Box::new(move |t, v| {
                if let FieldValue::Str(s) = v {
                    *get_mut(t) = s;
                }
            })),
            encode: None,
            decode: None,
            empty: None,
        });
    }

    /// Registers a field with a custom text codec. `encode` renders the
    /// field, `decode` binds text into it, and `empty` reports whether the
    /// field would be skipped under `omitempty`.
    pub fn text(
        &mut self,
        name: &'static str,
        tag: &'static str,
        encode: impl Fn(&T) -> std::result::Result<String, String> + Send + Sync + 'static,
        decode: impl Fn(&mut T, &str) -> std::result::Result<(), String> + Send + Sync + 'static,
        empty: impl Fn(&T) -> bool + Send + Sync + 'static,
    ) {
        self.push(RawField {
            name,
            tag,
            index: Vec::new(),
            kind: FieldKind::Text,
            bits: 0,
            derived_len: 0,
            get: None,
            set: None,
            encode: Some(Box::new(encode)),
            decode: Some(Box::new(decode)),
            empty: Some(Box::new(empty)),
        });
    }

    /// Embeds the fields of another scheme, extending their index paths.
    pub fn embed<S: Record>(
        &mut self,
        get: impl Fn(&T) -> &S + Copy + Send + Sync + 'static,
        get_mut: impl Fn(&mut T) -> &mut S + Copy + Send + Sync + 'static,
    ) {
        let mut inner = SchemaBuilder::<S>::new();
        S::describe(&mut inner);
        let pos = self.pos;
        self.pos += 1;
        for child in inner.fields {
            let mut index = vec![pos];
            index.extend(child.index);
            self.fields.push(RawField {
                name: child.name,
                tag: child.tag,
                index,
                kind: child.kind,
                bits: child.bits,
                derived_len: child.derived_len,
                get: child.get.map(|g| -> GetFn<T> { Box::new(move |t| g(get(t))) }),
                set: child
                    .set
                    .map(|s| -> SetFn<T> { Box::new(move |t, v| s(get_mut(t), v)) }),
                encode: child
                    .encode
                    .map(|e| -> EncodeFn<T> { Box::new(move |t| e(get(t))) }),
                decode: child
                    .decode
                    .map(|d| -> DecodeFn<T> { Box::new(move |t, text| d(get_mut(t), text)) }),
                empty: child
                    .empty
                    .map(|e| -> EmptyFn<T> { Box::new(move |t| e(get(t))) }),
            });
        }
    }
}

fn short_type_name<T: 'static>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}

fn apply_tag(opts: &mut FieldOptions, tag: &'static str) -> std::result::Result<(), ()> {
    if tag.is_empty() {
        return Ok(());
    }
    for opt in tag.split(',') {
        if opt == "omitempty" {
            opts.omit_empty = true;
        } else if opt == "group" {
            opts.group = true;
        } else if opt == "inline" {
            opts.inline = true;
        } else if let Some(name) = opt.strip_prefix("param:") {
            if name.is_empty() {
                return Err(());
            }
            opts.param = Some(name);
        } else if let Some(enc) = opt.strip_prefix("enc:") {
            match enc {
                "base64" => opts.encoding = Some(&BASE64),
                "none" => opts.encoding = None,
                _ => return Err(()),
            }
        } else if let Some(n) = opt.strip_prefix("length:") {
            let n: usize = n.parse().map_err(|_| ())?;
            if opts.length == 0 || n < opts.length {
                opts.length = n;
            }
        } else if let Some(b) = opt.strip_prefix("base:") {
            opts.base = b.parse().map_err(|_| ())?;
        } else {
            return Err(());
        }
    }
    Ok(())
}

impl<T: Record> Schema<T> {
    fn compile() -> Result<Schema<T>> {
        let mut b = SchemaBuilder::<T>::new();
        T::describe(&mut b);
        let type_name = short_type_name::<T>();

        // Parse tags and check field invariants.
        let mut opts_list = Vec::with_capacity(b.fields.len());
        for raw in &b.fields {
            let mut opts = FieldOptions::defaults();
            if raw.name == "prefix" {
                opts.prefix = true;
                opts.encoding = None;
            }
            opts.length = raw.derived_len;
            let invalid = Error::Schema {
                type_name,
                field: raw.name,
                tag: raw.tag,
            };
            if apply_tag(&mut opts, raw.tag).is_err() {
                return Err(invalid);
            }
            if (opts.omit_empty && opts.inline)
                || (opts.group && opts.param.is_none())
                || (opts.param.is_some() && opts.prefix)
                || (opts.inline && (opts.prefix || opts.length == 0))
                || !(2..=36).contains(&opts.base)
            {
                return Err(invalid);
            }
            opts_list.push(opts);
        }

        // The required count includes duplicated params: it mirrors the
        // number of positional values a full hash string carries.
        let mut required = 0;
        for opts in &opts_list {
            if opts.prefix {
                continue;
            }
            if !opts.group && !opts.omit_empty && !opts.inline {
                required += 1;
            }
        }

        // Resolve param duplicates: the shallowest index path wins and
        // takes the position of the first occurrence; fields at equal
        // depth conflict.
        let mut winners: Vec<Option<usize>> = vec![None; b.fields.len()];
        let mut seen: Vec<&'static str> = Vec::new();
        for i in 0..b.fields.len() {
            if opts_list[i].prefix {
                continue;
            }
            let param = match opts_list[i].param {
                Some(p) => p,
                None => {
                    winners[i] = Some(i);
                    continue;
                }
            };
            if seen.contains(&param) {
                continue;
            }
            seen.push(param);
            let mut candidates: Vec<usize> = Vec::new();
            for (j, opts) in opts_list.iter().enumerate() {
                if opts.param == Some(param) && !opts.prefix {
                    for &prev in &candidates {
                        if b.fields[prev].index.len() == b.fields[j].index.len() {
                            return Err(Error::ParamConflict {
                                type_name,
                                field1: b.fields[j].name,
                                tag1: b.fields[j].tag,
                                field2: b.fields[prev].name,
                                tag2: b.fields[prev].tag,
                            });
                        }
                    }
                    candidates.push(j);
                }
            }
            let winner = candidates
                .iter()
                .copied()
                .min_by_key(|&j| b.fields[j].index.len());
            winners[i] = winner;
        }

        // Assemble in declaration order, extracting the prefix field.
        let mut slots: Vec<Option<RawField<T>>> = b.fields.into_iter().map(Some).collect();
        let mut prefix = None;
        let mut fields = Vec::new();
        for i in 0..slots.len() {
            if opts_list[i].prefix {
                if let Some(raw) = slots[i].take() {
                    prefix = Some(make_field(raw, std::mem::replace(&mut opts_list[i], FieldOptions::defaults())));
                }
                continue;
            }
            let Some(w) = winners[i] else { continue };
            if let Some(raw) = slots[w].take() {
                let opts = std::mem::replace(&mut opts_list[w], FieldOptions::defaults());
                fields.push(make_field(raw, opts));
            }
        }

        Ok(Schema {
            type_name,
            prefix,
            fields,
            required,
        })
    }
}

fn make_field<T>(raw: RawField<T>, opts: FieldOptions) -> Field<T> {
    Field {
        name: raw.name,
        tag: raw.tag,
        index: raw.index,
        kind: raw.kind,
        bits: raw.bits,
        opts,
        get: raw.get,
        set: raw.set,
        encode: raw.encode,
        decode: raw.decode,
        empty: raw.empty,
    }
}

static SCHEMAS: OnceLock<RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>> = OnceLock::new();

/// Returns the compiled schema for `T`, compiling and caching it on first
/// use.
pub(crate) fn of<T: Record>() -> Result<Arc<Schema<T>>> {
    let cache = SCHEMAS.get_or_init(|| RwLock::new(HashMap::new()));
    let key = TypeId::of::<T>();
    let cached = {
        let read = cache.read().unwrap_or_else(|e| e.into_inner());
        read.get(&key).cloned()
    };
    let any = match cached {
        Some(any) => any,
        None => {
            let schema: Arc<dyn Any + Send + Sync> = Arc::new(Schema::<T>::compile()?);
            let mut write = cache.write().unwrap_or_else(|e| e.into_inner());
            write.entry(key).or_insert_with(|| schema.clone());
            write.get(&key).cloned().unwrap_or(schema)
        }
    };
    match any.downcast::<Schema<T>>() {
        Ok(schema) => Ok(schema),
        Err(_) => unreachable!("schema cache is keyed by TypeId"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Plain {
        prefix: String,
        salt: Vec<u8>,
        rounds: u32,
        sum: [u8; 11],
    }

    impl Record for Plain {
        fn describe(b: &mut SchemaBuilder<Self>) {
            b.string("prefix", "", |s| &s.prefix, |s| &mut s.prefix);
            b.uint32(
                "rounds",
                "param:rounds,omitempty",
                |s| s.rounds,
                |s, v| s.rounds = v,
            );
            b.bytes("salt", "", |s| &s.salt, |s| &mut s.salt);
            b.byte_array("sum", "", |s| &s.sum, |s| &mut s.sum);
        }
    }

    #[test]
    fn compiles_and_caches() {
        let schema = of::<Plain>().unwrap();
        assert_eq!(schema.type_name, "Plain");
        assert!(schema.prefix.is_some());
        assert_eq!(schema.fields.len(), 3);
        assert_eq!(schema.required, 2);
        assert_eq!(schema.fields[2].opts.length, 11);
        let again = of::<Plain>().unwrap();
        assert!(Arc::ptr_eq(&schema, &again));
    }

    macro_rules! tag_case {
        ($name:ident, $ty:ident, $tag:expr, $field:expr) => {
            #[derive(Default)]
            struct $ty {
                value: u32,
            }

            impl Record for $ty {
                fn describe(b: &mut SchemaBuilder<Self>) {
                    b.uint32("value", $tag, |s| s.value, |s, v| s.value = v);
                }
            }

            #[test]
            fn $name() {
                assert_eq!(
                    of::<$ty>().unwrap_err(),
                    Error::Schema {
                        type_name: stringify!($ty),
                        field: $field,
                        tag: $tag,
                    }
                );
            }
        };
    }

    tag_case!(rejects_unknown_option, BadOption, "sneaky", "value");
    tag_case!(rejects_group_without_param, BadGroup, "group", "value");
    tag_case!(rejects_inline_without_length, BadInline, "inline", "value");
    tag_case!(rejects_omitempty_inline, BadOmitInline, "length:2,inline,omitempty", "value");
    tag_case!(rejects_bad_base, BadBase, "base:37", "value");
    tag_case!(rejects_bad_length, BadLength, "length:x", "value");

    #[derive(Default)]
    struct ParamOnPrefix {
        prefix: String,
    }

    impl Record for ParamOnPrefix {
        fn describe(b: &mut SchemaBuilder<Self>) {
            b.string("prefix", "param:p", |s| &s.prefix, |s| &mut s.prefix);
        }
    }

    #[test]
    fn rejects_param_on_prefix() {
        assert_eq!(
            of::<ParamOnPrefix>().unwrap_err(),
            Error::Schema {
                type_name: "ParamOnPrefix",
                field: "prefix",
                tag: "param:p",
            }
        );
    }

    #[derive(Default)]
    struct Conflict {
        a: u32,
        b: u32,
    }

    impl Record for Conflict {
        fn describe(b: &mut SchemaBuilder<Self>) {
            b.uint32("a", "param:x", |s| s.a, |s, v| s.a = v);
            b.uint32("b", "param:x", |s| s.b, |s, v| s.b = v);
        }
    }

    #[test]
    fn rejects_equal_depth_param_conflict() {
        assert_eq!(
            of::<Conflict>().unwrap_err(),
            Error::ParamConflict {
                type_name: "Conflict",
                field1: "b",
                tag1: "param:x",
                field2: "a",
                tag2: "param:x",
            }
        );
    }

    #[derive(Default)]
    struct Inner {
        x: u32,
    }

    impl Record for Inner {
        fn describe(b: &mut SchemaBuilder<Self>) {
            b.uint32("x", "param:x", |s| s.x, |s, v| s.x = v);
        }
    }

    #[derive(Default)]
    struct Outer {
        inner: Inner,
        x: u32,
    }

    impl Record for Outer {
        fn describe(b: &mut SchemaBuilder<Self>) {
            b.embed(|s: &Outer| &s.inner, |s: &mut Outer| &mut s.inner);
            b.uint32("x", "param:x", |s| s.x, |s, v| s.x = v);
        }
    }

    #[test]
    fn shallow_param_wins_over_embedded() {
        let schema = of::<Outer>().unwrap();
        assert_eq!(schema.fields.len(), 1);
        assert_eq!(schema.fields[0].index, vec![1]);
        // both raw fields are counted as required values
        assert_eq!(schema.required, 2);
    }
}
