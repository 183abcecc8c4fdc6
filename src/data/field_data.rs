//! Columnar field data exchanged with the execution engine.

use serde::{Deserialize, Serialize};

use crate::error::{Result, VecnodeError};
use crate::schema::{CollectionSchema, DataType, FieldSchema, SchemaResolver};

/// Column payload. Dense vectors store `dim` components per row in one flat
/// buffer, in the element width of their type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValues {
    Bool(Vec<bool>),
    /// Int8, Int16 and Int32 columns.
    Int(Vec<i32>),
    Long(Vec<i64>),
    Float(Vec<f32>),
    Double(Vec<f64>),
    String(Vec<String>),
    /// One nested column per row, all of `element_type`.
    Array {
        element_type: DataType,
        rows: Vec<FieldValues>,
    },
    /// Serialized JSON documents.
    Json(Vec<String>),
    FloatVector {
        dim: usize,
        data: Vec<f32>,
    },
    BinaryVector {
        dim: usize,
        data: Vec<u8>,
    },
    Float16Vector {
        dim: usize,
        data: Vec<u8>,
    },
    BFloat16Vector {
        dim: usize,
        data: Vec<u8>,
    },
    /// Encoded sparse rows; `dim` is the widest row seen.
    SparseFloatVector {
        dim: usize,
        contents: Vec<Vec<u8>>,
    },
}

impl FieldValues {
    /// Empty column of `dtype`. Dense vector types need a dimension.
    pub fn empty(dtype: DataType, element_type: DataType, dim: usize) -> Result<Self> {
        let values = match dtype {
            DataType::Bool => FieldValues::Bool(Vec::new()),
            DataType::Int8 | DataType::Int16 | DataType::Int32 => FieldValues::Int(Vec::new()),
            DataType::Int64 => FieldValues::Long(Vec::new()),
            DataType::Float => FieldValues::Float(Vec::new()),
            DataType::Double => FieldValues::Double(Vec::new()),
            DataType::String | DataType::VarChar => FieldValues::String(Vec::new()),
            DataType::Array => FieldValues::Array {
                element_type,
                rows: Vec::new(),
            },
            DataType::Json => FieldValues::Json(Vec::new()),
            DataType::FloatVector => FieldValues::FloatVector {
                dim,
                data: Vec::new(),
            },
            DataType::BinaryVector => FieldValues::BinaryVector {
                dim,
                data: Vec::new(),
            },
            DataType::Float16Vector => FieldValues::Float16Vector {
                dim,
                data: Vec::new(),
            },
            DataType::BFloat16Vector => FieldValues::BFloat16Vector {
                dim,
                data: Vec::new(),
            },
            DataType::SparseFloatVector => FieldValues::SparseFloatVector {
                dim: 0,
                contents: Vec::new(),
            },
            DataType::None => {
                return Err(VecnodeError::internal("Unknown data type: None"));
            }
        };
        Ok(values)
    }

    /// Bytes (or floats) one dense vector row occupies.
    fn row_width(&self) -> usize {
        match self {
            FieldValues::FloatVector { dim, .. } => *dim,
            FieldValues::BinaryVector { dim, .. } => dim / 8,
            FieldValues::Float16Vector { dim, .. } | FieldValues::BFloat16Vector { dim, .. } => {
                dim * 2
            }
            _ => 1,
        }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        let width = self.row_width().max(1);
        match self {
            FieldValues::Bool(v) => v.len(),
            FieldValues::Int(v) => v.len(),
            FieldValues::Long(v) => v.len(),
            FieldValues::Float(v) => v.len(),
            FieldValues::Double(v) => v.len(),
            FieldValues::String(v) => v.len(),
            FieldValues::Array { rows, .. } => rows.len(),
            FieldValues::Json(v) => v.len(),
            FieldValues::FloatVector { data, .. } => data.len() / width,
            FieldValues::BinaryVector { data, .. }
            | FieldValues::Float16Vector { data, .. }
            | FieldValues::BFloat16Vector { data, .. } => data.len() / width,
            FieldValues::SparseFloatVector { contents, .. } => contents.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy the rows at `indexes`, in that order.
    pub fn pick(&self, indexes: &[usize]) -> Result<Self> {
        let len = self.len();
        if let Some(bad) = indexes.iter().find(|&&i| i >= len) {
            return Err(VecnodeError::internal(format!(
                "row index {bad} out of range for column of {len} rows"
            )));
        }

        fn gather<T: Clone>(src: &[T], indexes: &[usize]) -> Vec<T> {
            indexes.iter().map(|&i| src[i].clone()).collect()
        }
        fn gather_rows<T: Clone>(src: &[T], width: usize, indexes: &[usize]) -> Vec<T> {
            let mut out = Vec::with_capacity(indexes.len() * width);
            for &i in indexes {
                out.extend_from_slice(&src[i * width..(i + 1) * width]);
            }
            out
        }

        let width = self.row_width();
        let picked = match self {
            FieldValues::Bool(v) => FieldValues::Bool(gather(v, indexes)),
            FieldValues::Int(v) => FieldValues::Int(gather(v, indexes)),
            FieldValues::Long(v) => FieldValues::Long(gather(v, indexes)),
            FieldValues::Float(v) => FieldValues::Float(gather(v, indexes)),
            FieldValues::Double(v) => FieldValues::Double(gather(v, indexes)),
            FieldValues::String(v) => FieldValues::String(gather(v, indexes)),
            FieldValues::Array { element_type, rows } => FieldValues::Array {
                element_type: *element_type,
                rows: gather(rows, indexes),
            },
            FieldValues::Json(v) => FieldValues::Json(gather(v, indexes)),
            FieldValues::FloatVector { dim, data } => FieldValues::FloatVector {
                dim: *dim,
                data: gather_rows(data, width, indexes),
            },
            FieldValues::BinaryVector { dim, data } => FieldValues::BinaryVector {
                dim: *dim,
                data: gather_rows(data, width, indexes),
            },
            FieldValues::Float16Vector { dim, data } => FieldValues::Float16Vector {
                dim: *dim,
                data: gather_rows(data, width, indexes),
            },
            FieldValues::BFloat16Vector { dim, data } => FieldValues::BFloat16Vector {
                dim: *dim,
                data: gather_rows(data, width, indexes),
            },
            FieldValues::SparseFloatVector { dim, contents } => FieldValues::SparseFloatVector {
                dim: *dim,
                contents: gather(contents, indexes),
            },
        };
        Ok(picked)
    }

    /// Concatenate `(start, len)` row ranges.
    pub fn slice(&self, ranges: &[(usize, usize)]) -> Result<Self> {
        let indexes: Vec<usize> = ranges
            .iter()
            .flat_map(|&(start, len)| start..start + len)
            .collect();
        self.pick(&indexes)
    }
}

/// One output column plus the schema facts the client needs to read it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldData {
    pub field_id: i64,
    pub field_name: String,
    pub data_type: DataType,
    #[serde(default)]
    pub is_dynamic: bool,
    pub values: FieldValues,
}

impl FieldData {
    pub fn new<S: Into<String>>(
        field_id: i64,
        field_name: S,
        data_type: DataType,
        values: FieldValues,
    ) -> Self {
        FieldData {
            field_id,
            field_name: field_name.into(),
            data_type,
            is_dynamic: false,
            values,
        }
    }

    /// Zero-row column shaped after `field`.
    pub fn empty_for(field: &FieldSchema, schema: &CollectionSchema) -> Result<Self> {
        let dim = match field.data_type {
            DataType::FloatVector
            | DataType::BinaryVector
            | DataType::Float16Vector
            | DataType::BFloat16Vector => {
                let dim = SchemaResolver::new(schema).dimension(field)?;
                usize::try_from(dim).map_err(|_| {
                    VecnodeError::internal(format!("invalid dimension {dim} of {}", field.name))
                })?
            }
            _ => 0,
        };
        Ok(FieldData {
            field_id: field.field_id,
            field_name: field.name.clone(),
            data_type: field.data_type,
            is_dynamic: field.is_dynamic,
            values: FieldValues::empty(field.data_type, field.element_type, dim)?,
        })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Same column metadata with only the rows at `indexes`.
    pub fn pick(&self, indexes: &[usize]) -> Result<Self> {
        Ok(self.with_values(self.values.pick(indexes)?))
    }

    /// Same column metadata with the rows of each `(start, len)` range.
    pub fn slice(&self, ranges: &[(usize, usize)]) -> Result<Self> {
        Ok(self.with_values(self.values.slice(ranges)?))
    }

    fn with_values(&self, values: FieldValues) -> Self {
        FieldData {
            field_id: self.field_id,
            field_name: self.field_name.clone(),
            data_type: self.data_type,
            is_dynamic: self.is_dynamic,
            values,
        }
    }
}
