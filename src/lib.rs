//! Schema-driven validation, reflection and traversal.
//!
//! A schema is a [`Type`] tree. [`from_reflection`] compiles it into a
//! [`Maker`], which validates untyped [`Value`]s and hands back normalized
//! copies tagged with the types they satisfy. Tags drive the rest:
//! [`serialize`] uses them to restore wire names, [`Traversal`] uses them to
//! find every instance of one named type inside another and rewrite it.
pub mod discriminate;
pub mod error;
pub mod format;
pub mod make;
pub mod options;
pub mod path_de;
pub mod serialize;
pub mod tags;
pub mod traversal;
pub mod ty;
pub mod value;

pub use discriminate::{discriminate_union, Differentiator};
pub use error::{Error, ErrorDetail, ErrorGroup, Result, ValidationError, ValidationFailure};
pub use format::{register_format, FormatRegistry};
pub use make::{
    create_maker, from_reflection, make_all_of, make_any, make_array, make_boolean, make_enum, make_integer,
    make_null, make_nullable, make_number, make_object, make_one_of, make_optional, make_string, make_void, Make,
    Maker,
};
pub use options::{MakeOptions, UnknownField};
pub use serialize::serialize;
pub use tags::{get_type, get_type_set, with_type, TypeSet};
pub use traversal::{Step, Traversal};
pub use ty::{
    AdditionalProperties, ArrayType, BooleanType, Literal, NamedType, NamedTypeDefinition, NumberType, ObjectType,
    PropType, StringType, Type,
};
pub use value::{Array, Object, Value};
