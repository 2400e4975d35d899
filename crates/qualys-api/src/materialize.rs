// Record materialization
//
// The dispatcher hands back bytes; turning them into domain records is
// the caller's business. A `Materializer` is that conversion, plus an
// optional way to read a record's identifier for cursor-based drivers.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::Error;
use crate::response::CallResponse;
use crate::xml::{as_list, at_path, scalar_text};

/// Turns a response body into records.
pub trait Materializer: Send + Sync {
    type Record: Send;

    fn materialize(&self, response: &CallResponse) -> Result<Vec<Self::Record>, Error>;

    /// Identifier used by last-id pagination. `None` stops the driver.
    fn record_id(&self, _record: &Self::Record) -> Option<String> {
        None
    }
}

type ConvertFn<R> = dyn Fn(&CallResponse) -> Result<Vec<R>, Error> + Send + Sync;
type IdFn<R> = dyn Fn(&R) -> Option<String> + Send + Sync;

/// Wraps a closure. Add [`with_id`](Self::with_id) when the endpoint
/// paginates by last id.
pub struct FnMaterializer<R> {
    convert: Box<ConvertFn<R>>,
    id: Option<Box<IdFn<R>>>,
}

impl<R> FnMaterializer<R> {
    pub fn new(
        convert: impl Fn(&CallResponse) -> Result<Vec<R>, Error> + Send + Sync + 'static,
    ) -> Self {
        Self {
            convert: Box::new(convert),
            id: None,
        }
    }

    pub fn with_id(mut self, id: impl Fn(&R) -> Option<String> + Send + Sync + 'static) -> Self {
        self.id = Some(Box::new(id));
        self
    }
}

impl<R: Send> Materializer for FnMaterializer<R> {
    type Record = R;

    fn materialize(&self, response: &CallResponse) -> Result<Vec<R>, Error> {
        (self.convert)(response)
    }

    fn record_id(&self, record: &R) -> Option<String> {
        self.id.as_ref().and_then(|id| id(record))
    }
}

// ── JSON ─────────────────────────────────────────────────────────────

/// Deserializes the array at a JSON pointer (`""` for a top-level array).
///
/// A missing pointer or `null` yields no records, which is how several
/// gateway services signal the last page.
pub struct JsonListMaterializer<T> {
    pointer: String,
    id_field: Option<String>,
    _record: PhantomData<fn() -> T>,
}

impl<T> JsonListMaterializer<T> {
    pub fn new(pointer: impl Into<String>) -> Self {
        Self {
            pointer: pointer.into(),
            id_field: None,
            _record: PhantomData,
        }
    }

    /// JSON pointer of the record id, relative to each record (`"/id"`).
    pub fn with_id_field(mut self, pointer: impl Into<String>) -> Self {
        self.id_field = Some(pointer.into());
        self
    }
}

impl<T: DeserializeOwned + serde::Serialize + Send> Materializer for JsonListMaterializer<T> {
    type Record = T;

    fn materialize(&self, response: &CallResponse) -> Result<Vec<T>, Error> {
        if response.is_empty() {
            return Ok(Vec::new());
        }
        let root: Value = response.json()?;
        match root.pointer(&self.pointer) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(items)) => items.iter().map(|v| deserialize(v, response)).collect(),
            Some(single) => Ok(vec![deserialize(single, response)?]),
        }
    }

    fn record_id(&self, record: &T) -> Option<String> {
        let pointer = self.id_field.as_deref()?;
        let value = serde_json::to_value(record).ok()?;
        scalar_text(value.pointer(pointer)?)
    }
}

// ── XML ──────────────────────────────────────────────────────────────

/// Deserializes the elements at a slash path of the XML view
/// (`"HOST_LIST_OUTPUT/RESPONSE/HOST_LIST/HOST"`).
pub struct XmlListMaterializer<T> {
    path: String,
    id_field: Option<String>,
    _record: PhantomData<fn() -> T>,
}

impl<T> XmlListMaterializer<T> {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            id_field: None,
            _record: PhantomData,
        }
    }

    /// Child element holding the record id (`"ID"`).
    pub fn with_id_field(mut self, element: impl Into<String>) -> Self {
        self.id_field = Some(element.into());
        self
    }
}

impl<T: DeserializeOwned + serde::Serialize + Send> Materializer for XmlListMaterializer<T> {
    type Record = T;

    fn materialize(&self, response: &CallResponse) -> Result<Vec<T>, Error> {
        if response.is_empty() {
            return Ok(Vec::new());
        }
        let view = response.xml_view()?;
        as_list(at_path(&view, &self.path))
            .into_iter()
            .map(|v| deserialize(v, response))
            .collect()
    }

    fn record_id(&self, record: &T) -> Option<String> {
        let field = self.id_field.as_deref()?;
        let value = serde_json::to_value(record).ok()?;
        scalar_text(at_path(&value, field)?)
    }
}

fn deserialize<T: DeserializeOwned>(value: &Value, response: &CallResponse) -> Result<T, Error> {
    T::deserialize(value).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body: response.text().into_owned(),
    })
}
