//! Columnar result data.

pub mod field_data;
pub mod ids;
pub mod placeholder;
pub mod results;

pub use field_data::{FieldData, FieldValues};
pub use ids::{Ids, PrimaryKey};
pub use placeholder::{Placeholder, PlaceholderGroup, PlaceholderType};
pub use results::{RetrieveResult, SearchResultData};

use crate::schema::CollectionSchema;

/// Result shapes whose columns can be annotated from the schema.
///
/// Engines return columns keyed only by field id; before a result goes back
/// to a client every requested column gets its name, type and dynamic flag.
pub trait AnnotateFields {
    fn fields_data_mut(&mut self) -> &mut [FieldData];

    /// Copy name, type and dynamic flag from `schema` onto every column whose
    /// field is named in `output_fields`. Names without a schema field are
    /// dynamic keys and are skipped.
    fn fill_in_field_info<S: AsRef<str>>(&mut self, output_fields: &[S], schema: &CollectionSchema) {
        let fields_data = self.fields_data_mut();
        for name in output_fields {
            let Some(field) = schema.field(name.as_ref()) else {
                continue;
            };
            for column in fields_data
                .iter_mut()
                .filter(|column| column.field_id == field.field_id)
            {
                column.field_name = field.name.clone();
                column.data_type = field.data_type;
                column.is_dynamic = field.is_dynamic;
            }
        }
    }
}

impl AnnotateFields for Vec<FieldData> {
    fn fields_data_mut(&mut self) -> &mut [FieldData] {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{DataType, FieldSchema};

    #[test]
    fn test_fill_in_field_info() {
        let schema = CollectionSchema::builder("c")
            .field(FieldSchema::new(100, "id", DataType::Int64).primary_key())
            .field(FieldSchema::new(101, "title", DataType::VarChar))
            .enable_dynamic_field()
            .build()
            .unwrap();
        let meta_id = schema.dynamic_field().unwrap().field_id;

        let mut columns = vec![
            FieldData::new(101, "", DataType::None, FieldValues::String(vec!["a".into()])),
            FieldData::new(meta_id, "", DataType::None, FieldValues::Json(vec!["{}".into()])),
        ];
        columns.fill_in_field_info(&["title", "$meta", "color"], &schema);

        assert_eq!(columns[0].field_name, "title");
        assert_eq!(columns[0].data_type, DataType::VarChar);
        assert!(!columns[0].is_dynamic);
        assert_eq!(columns[1].field_name, "$meta");
        assert_eq!(columns[1].data_type, DataType::Json);
        assert!(columns[1].is_dynamic);
    }
}
