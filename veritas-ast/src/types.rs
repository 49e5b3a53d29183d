#![forbid(unsafe_code)]

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Span;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveKind {
    I8,
    I16,
    I32,
    I64,
    I128,
    U8,
    U16,
    U32,
    U64,
    U128,
    F32,
    F64,
    Bool,
    Char,
    Str,
}

impl PrimitiveKind {
    pub fn from_name(name: &str) -> Option<Self> {
        let kind = match name {
            "i8" => Self::I8,
            "i16" => Self::I16,
            "i32" => Self::I32,
            "i64" => Self::I64,
            "i128" => Self::I128,
            "u8" => Self::U8,
            "u16" => Self::U16,
            "u32" => Self::U32,
            "u64" => Self::U64,
            "u128" => Self::U128,
            "f32" => Self::F32,
            "f64" => Self::F64,
            "bool" => Self::Bool,
            "char" => Self::Char,
            "str" => Self::Str,
            _ => return None,
        };
        Some(kind)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::I128 => "i128",
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::U128 => "u128",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::Bool => "bool",
            Self::Char => "char",
            Self::Str => "str",
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            Self::I8
                | Self::I16
                | Self::I32
                | Self::I64
                | Self::I128
                | Self::U8
                | Self::U16
                | Self::U32
                | Self::U64
                | Self::U128
        )
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Side-effect categories a function signature may declare (`!IO + Async`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EffectKind {
    IO,
    State,
    Error,
    Async,
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EffectKind::IO => "IO",
            EffectKind::State => "State",
            EffectKind::Error => "Error",
            EffectKind::Async => "Async",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Effect {
    pub span: Span,
    pub kind: EffectKind,
    /// Payload for `State<T>` and `Error<E>`.
    #[serde(default)]
    pub type_arg: Option<TypeExpr>,
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.type_arg {
            Some(arg) => write!(f, "{}<{}>", self.kind, arg),
            None => write!(f, "{}", self.kind),
        }
    }
}

/// Type syntax as written in the source.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TypeExpr {
    pub span: Span,
    pub kind: TypeExprKind,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum TypeExprKind {
    Primitive(PrimitiveKind),
    /// `std::collections::Map<K, V>`, `Option<T>`, `UserId`, `T`.
    Path {
        segments: Vec<String>,
        #[serde(default)]
        args: Vec<TypeExpr>,
    },
    /// `u64 as UserId`
    Branded {
        base: Box<TypeExpr>,
        brand: String,
    },
    /// `fn(i32, i32) -> i32 !IO`
    Function {
        params: Vec<TypeExpr>,
        #[serde(default)]
        ret: Option<Box<TypeExpr>>,
        #[serde(default)]
        effects: Vec<Effect>,
    },
    Reference {
        inner: Box<TypeExpr>,
        #[serde(default)]
        mutable: bool,
        #[serde(default)]
        lifetime: Option<String>,
    },
    Tuple(Vec<TypeExpr>),
    /// `[T; N]`, or a slice `[T]` when `len` is absent.
    Array {
        elem: Box<TypeExpr>,
        #[serde(default)]
        len: Option<u64>,
    },
}

impl TypeExpr {
    pub fn new(span: Span, kind: TypeExprKind) -> Self {
        Self { span, kind }
    }

    pub fn unit(span: Span) -> Self {
        Self::new(span, TypeExprKind::Tuple(Vec::new()))
    }

    /// The full `a::b::C` path name, if this is a path type.
    pub fn path_name(&self) -> Option<String> {
        match &self.kind {
            TypeExprKind::Path { segments, .. } => Some(segments.join("::")),
            _ => None,
        }
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TypeExprKind::Primitive(p) => write!(f, "{p}"),
            TypeExprKind::Path { segments, args } => {
                write!(f, "{}", segments.join("::"))?;
                if !args.is_empty() {
                    write!(f, "<{}>", join(args, ", "))?;
                }
                Ok(())
            }
            TypeExprKind::Branded { base, brand } => write!(f, "{base} as {brand}"),
            TypeExprKind::Function {
                params,
                ret,
                effects,
            } => {
                write!(f, "fn({})", join(params, ", "))?;
                if let Some(ret) = ret {
                    write!(f, " -> {ret}")?;
                }
                if !effects.is_empty() {
                    write!(f, " !{}", join(effects, " + "))?;
                }
                Ok(())
            }
            TypeExprKind::Reference {
                inner,
                mutable,
                lifetime,
            } => {
                f.write_str("&")?;
                if let Some(lt) = lifetime {
                    write!(f, "'{lt} ")?;
                }
                if *mutable {
                    f.write_str("mut ")?;
                }
                write!(f, "{inner}")
            }
            TypeExprKind::Tuple(elems) => write!(f, "({})", join(elems, ", ")),
            TypeExprKind::Array { elem, len } => match len {
                Some(n) => write!(f, "[{elem}; {n}]"),
                None => write!(f, "[{elem}]"),
            },
        }
    }
}

fn join<T: fmt::Display>(items: &[T], sep: &str) -> String {
    items
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(sep)
}
