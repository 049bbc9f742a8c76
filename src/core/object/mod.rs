use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

/// An untyped (JSON) Object from which [TypedParameters](TypedParameter) can be parsed.
///
/// Represents discovery documents and endpoint response bodies. Members this crate does not
/// model are kept, so callers can still read them.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct UntypedObject(pub(crate) Map<String, Json>);

/// A strongly typed parameter that can represent a metadata entry or a response member.
pub trait TypedParameter:
    TryFrom<Json, Error = anyhow::Error> + Into<Json> + Clone + std::fmt::Debug
{
    const KEY: &'static str;
}

impl UntypedObject {
    /// Get a [TypedParameter] from the Object.
    ///
    /// Note that this method clones the underlying data.
    pub fn get<T: TypedParameter>(&self) -> Option<Result<T>> {
        Some(self.0.get(T::KEY)?.clone().try_into())
    }

    /// Get an optional [TypedParameter], treating `null` the same as an absent member.
    pub fn get_optional<T: TypedParameter>(&self) -> Result<Option<T>> {
        match self.0.get(T::KEY) {
            None | Some(Json::Null) => Ok(None),
            Some(value) => value
                .clone()
                .try_into()
                .map(Some)
                .with_context(|| format!("'{}' could not be parsed", T::KEY)),
        }
    }

    /// Insert a [TypedParameter], returning the raw value it replaced.
    pub fn insert<T: TypedParameter>(&mut self, t: T) -> Option<Json> {
        self.0.insert(T::KEY.to_owned(), t.into())
    }

    /// Get a raw member by key.
    pub fn get_raw(&self, key: &str) -> Option<&Json> {
        self.0.get(key)
    }
}

impl From<UntypedObject> for Json {
    fn from(value: UntypedObject) -> Self {
        value.0.into()
    }
}

impl From<Map<String, Json>> for UntypedObject {
    fn from(value: Map<String, Json>) -> Self {
        Self(value)
    }
}

pub trait ParsingErrorContext {
    type T: TypedParameter;

    fn parsing_error(self) -> Result<Self::T>;
}

impl<T: TypedParameter> ParsingErrorContext for Option<Result<T>> {
    type T = T;

    fn parsing_error(self) -> Result<T> {
        self.context(format!("'{}' is missing", T::KEY))?
            .context(format!("'{}' could not be parsed", T::KEY))
    }
}

impl<T: TypedParameter> ParsingErrorContext for Result<T> {
    type T = T;

    fn parsing_error(self) -> Result<T> {
        self.context(format!("'{}' could not be parsed", T::KEY))
    }
}
