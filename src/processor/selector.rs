use std::fmt;

use crate::processor::{ColumnResolutionError, GroupingSpec, Record};

/// Separates tokens in a descriptor string.
pub const DESCRIPTOR_SEPARATOR: char = ',';

/// Separates the column part of a token from its sub-field path.
pub const SUB_FIELD_MARKER: char = '#';

/// One parsed `<name-or-index>[#<subFieldPath>]` token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub column: String,
    pub sub_field_path: Option<String>,
}

impl ColumnDescriptor {
    fn parse(token: &str) -> Self {
        match token.split_once(SUB_FIELD_MARKER) {
            Some((column, path)) => ColumnDescriptor {
                column: column.to_string(),
                sub_field_path: Some(path.to_string()).filter(|p| !p.is_empty()),
            },
            None => ColumnDescriptor {
                column: token.to_string(),
                sub_field_path: None,
            },
        }
    }

    fn into_spec(self, column_index: usize) -> GroupingSpec {
        match self.sub_field_path {
            Some(path) => GroupingSpec::json_path(column_index, &path),
            None => GroupingSpec::column(column_index),
        }
    }
}

/// User column selection, e.g. `category,other#hobby` or `0,7#style`.
///
/// # Example
/// ```rust
/// # use group_counter::processor::selector::ColumnSelector;
/// # use csv::StringRecord;
/// let header = StringRecord::from(vec!["name", "data"]);
/// let specs = ColumnSelector::parse("data#k,name").resolve(Some(&header)).unwrap();
/// assert_eq!(specs[0].column_index(), 1);
/// assert_eq!(specs[0].sub_field_path(), Some("k"));
/// assert_eq!(specs[1].column_index(), 0);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSelector {
    descriptors: Vec<ColumnDescriptor>,
}

impl ColumnSelector {
    /// Parses a comma-separated descriptor string. Empty tokens are skipped.
    pub fn parse(descriptors: &str) -> Self {
        let descriptors = descriptors
            .split(DESCRIPTOR_SEPARATOR)
            .filter(|token| !token.is_empty())
            .map(ColumnDescriptor::parse)
            .collect();

        ColumnSelector { descriptors }
    }

    pub fn descriptors(&self) -> &[ColumnDescriptor] {
        &self.descriptors
    }

    /// Resolves descriptors into grouping specs, in descriptor order.
    ///
    /// With a header, the column part names a header field (first match
    /// wins). Without one, it must be a non-negative column index.
    ///
    /// # Errors
    /// - [`ColumnResolutionError::UnresolvedColumn`] if a name is not in the header
    /// - [`ColumnResolutionError::InvalidColumnIndex`] if an index does not parse
    /// - [`ColumnResolutionError::NoColumnsSpecified`] if nothing was selected
    pub fn resolve(
        &self,
        header: Option<&Record>,
    ) -> Result<Vec<GroupingSpec>, ColumnResolutionError> {
        let specs = self
            .descriptors
            .iter()
            .cloned()
            .map(|descriptor| -> Result<GroupingSpec, ColumnResolutionError> {
                let column_index = match header {
                    Some(header) => header
                        .iter()
                        .position(|name| name == descriptor.column)
                        .ok_or_else(|| {
                            ColumnResolutionError::UnresolvedColumn(descriptor.column.clone())
                        })?,
                    None => descriptor.column.parse::<usize>().map_err(|_| {
                        ColumnResolutionError::InvalidColumnIndex(descriptor.column.clone())
                    })?,
                };
                Ok(descriptor.into_spec(column_index))
            })
            .collect::<Result<Vec<_>, _>>()?;

        if specs.is_empty() {
            return Err(ColumnResolutionError::NoColumnsSpecified);
        }

        Ok(specs)
    }
}

impl fmt::Display for ColumnSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, d) in self.descriptors.iter().enumerate() {
            if i > 0 {
                write!(f, "{DESCRIPTOR_SEPARATOR}")?;
            }
            write!(f, "{}", d.column)?;
            if let Some(path) = &d.sub_field_path {
                write!(f, "{SUB_FIELD_MARKER}{path}")?;
            }
        }
        Ok(())
    }
}
