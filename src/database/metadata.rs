//! Entity metadata used to resolve dotted column paths.
//!
//! Sea-ORM entities carry their columns and primary keys at the type level, but
//! relation property names, embedded column groups and computed columns are
//! application knowledge. [`EntityMetadata`] captures all of it in one runtime
//! value that the column resolver can walk by string.

use std::fmt;
use std::sync::Arc;

use sea_orm::{
    ColumnTrait, ColumnType, EntityTrait, IdenStatic, Identity, Iterable,
    PrimaryKeyToColumn, RelationDef,
};

/// Builds the SQL for a computed column from the alias of the table it belongs to.
pub type VirtualExpression = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Coarse column type, enough to coerce string filter values and pick dialect casts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Float,
    Boolean,
    Uuid,
    DateTime,
    Text,
    Enum,
    Other,
}

impl From<&ColumnType> for ColumnKind {
    fn from(column_type: &ColumnType) -> Self {
        match column_type {
            ColumnType::TinyInteger
            | ColumnType::SmallInteger
            | ColumnType::Integer
            | ColumnType::BigInteger
            | ColumnType::TinyUnsigned
            | ColumnType::SmallUnsigned
            | ColumnType::Unsigned
            | ColumnType::BigUnsigned => Self::Integer,
            ColumnType::Float | ColumnType::Double | ColumnType::Decimal(_) | ColumnType::Money(_) => {
                Self::Float
            }
            ColumnType::Boolean => Self::Boolean,
            ColumnType::Uuid => Self::Uuid,
            ColumnType::DateTime | ColumnType::Timestamp | ColumnType::TimestampWithTimeZone => {
                Self::DateTime
            }
            ColumnType::Char(_) | ColumnType::String(_) | ColumnType::Text => Self::Text,
            ColumnType::Enum { .. } | ColumnType::Custom(_) => Self::Enum,
            _ => Self::Other,
        }
    }
}

#[derive(Clone)]
pub struct ColumnMetadata {
    /// Property name used in column paths.
    pub property: String,
    /// Database column name.
    pub name: String,
    pub kind: ColumnKind,
    pub primary: bool,
    pub is_virtual: bool,
    pub expression: Option<VirtualExpression>,
}

impl fmt::Debug for ColumnMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnMetadata")
            .field("property", &self.property)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("primary", &self.primary)
            .field("is_virtual", &self.is_virtual)
            .field("expression", &self.expression.is_some())
            .finish()
    }
}

impl ColumnMetadata {
    pub fn new(property: impl Into<String>, kind: ColumnKind) -> Self {
        let property = property.into();
        Self {
            name: property.clone(),
            property,
            kind,
            primary: false,
            is_virtual: false,
            expression: None,
        }
    }

    /// A computed column. `expression` receives the owning table alias.
    pub fn computed<F>(property: impl Into<String>, kind: ColumnKind, expression: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        Self {
            is_virtual: true,
            expression: Some(Arc::new(expression)),
            ..Self::new(property, kind)
        }
    }

    /// A computed column whose value is already selected on the source builder under
    /// `<alias>_<property>`.
    pub fn virtual_alias(property: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            is_virtual: true,
            ..Self::new(property, kind)
        }
    }

    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub const fn primary(mut self) -> Self {
        self.primary = true;
        self
    }
}

#[derive(Debug, Clone)]
pub struct RelationMetadata {
    pub property: String,
    pub target: Arc<EntityMetadata>,
    /// `(local column, target column)` pairs, database names.
    pub join_on: Vec<(String, String)>,
    pub eager: bool,
}

impl RelationMetadata {
    pub fn new(property: impl Into<String>, target: Arc<EntityMetadata>) -> Self {
        Self {
            property: property.into(),
            target,
            join_on: Vec::new(),
            eager: false,
        }
    }

    /// Takes the join columns from a Sea-ORM relation definition
    /// (`Relation::Owner.def()`).
    pub fn from_def(property: impl Into<String>, def: &RelationDef, target: Arc<EntityMetadata>) -> Self {
        let join_on = identity_names(&def.from_col)
            .into_iter()
            .zip(identity_names(&def.to_col))
            .collect();
        Self {
            join_on,
            ..Self::new(property, target)
        }
    }

    #[must_use]
    pub fn on(mut self, local: impl Into<String>, foreign: impl Into<String>) -> Self {
        self.join_on.push((local.into(), foreign.into()));
        self
    }

    #[must_use]
    pub const fn eager(mut self) -> Self {
        self.eager = true;
        self
    }

    /// One row can match several target rows: the join does not pin every target primary key.
    #[must_use]
    pub fn is_to_many(&self) -> bool {
        let primary = self.target.primary_columns();
        primary.is_empty()
            || !primary
                .iter()
                .all(|pk| self.join_on.iter().any(|(_, foreign)| *foreign == pk.name))
    }
}

fn identity_names(identity: &Identity) -> Vec<String> {
    match identity {
        Identity::Unary(a) => vec![a.to_string()],
        Identity::Binary(a, b) => vec![a.to_string(), b.to_string()],
        Identity::Ternary(a, b, c) => vec![a.to_string(), b.to_string(), c.to_string()],
        Identity::Many(idens) => idens.iter().map(|i| i.to_string()).collect(),
    }
}

/// A group of columns stored inline on the owning table.
#[derive(Debug, Clone)]
pub struct EmbeddedMetadata {
    pub property: String,
    pub columns: Vec<ColumnMetadata>,
}

impl EmbeddedMetadata {
    pub fn new(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            columns: Vec::new(),
        }
    }

    /// Adds a column stored as `<embedded>_<property>` unless it was renamed with
    /// [`ColumnMetadata::named`].
    #[must_use]
    pub fn column(mut self, mut column: ColumnMetadata) -> Self {
        if column.name == column.property {
            column.name = format!("{}_{}", self.property, column.property);
        }
        self.columns.push(column);
        self
    }
}

#[derive(Debug, Clone)]
pub struct EntityMetadata {
    pub table: String,
    pub columns: Vec<ColumnMetadata>,
    pub relations: Vec<RelationMetadata>,
    pub embeddeds: Vec<EmbeddedMetadata>,
    /// Soft-delete marker column, database name.
    pub delete_date_column: Option<String>,
}

impl EntityMetadata {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            relations: Vec::new(),
            embeddeds: Vec::new(),
            delete_date_column: None,
        }
    }

    /// Reads table name, columns and primary keys from a Sea-ORM entity.
    #[must_use]
    pub fn from_entity<E: EntityTrait>() -> Self {
        let primary: Vec<String> = E::PrimaryKey::iter()
            .map(|pk| pk.into_column().as_str().to_string())
            .collect();
        let columns = E::Column::iter()
            .map(|col| {
                let name = col.as_str().to_string();
                let kind = ColumnKind::from(col.def().get_column_type());
                let mut column = ColumnMetadata::new(name.clone(), kind);
                column.primary = primary.contains(&name);
                column
            })
            .collect();
        Self {
            columns,
            ..Self::new(E::default().table_name())
        }
    }

    #[must_use]
    pub fn column(mut self, column: ColumnMetadata) -> Self {
        self.columns.push(column);
        self
    }

    #[must_use]
    pub fn relation(mut self, relation: RelationMetadata) -> Self {
        self.relations.push(relation);
        self
    }

    #[must_use]
    pub fn embedded(mut self, embedded: EmbeddedMetadata) -> Self {
        self.embeddeds.push(embedded);
        self
    }

    #[must_use]
    pub fn soft_delete(mut self, column: impl Into<String>) -> Self {
        self.delete_date_column = Some(column.into());
        self
    }

    #[must_use]
    pub fn find_column(&self, property: &str) -> Option<&ColumnMetadata> {
        self.columns.iter().find(|c| c.property == property)
    }

    #[must_use]
    pub fn find_relation(&self, property: &str) -> Option<&RelationMetadata> {
        self.relations.iter().find(|r| r.property == property)
    }

    #[must_use]
    pub fn find_embedded(&self, property: &str) -> Option<&EmbeddedMetadata> {
        self.embeddeds.iter().find(|e| e.property == property)
    }

    /// Column lookup by a path relative to this entity: `name` or `embedded.name`.
    #[must_use]
    pub fn find_column_by_path(&self, path: &str) -> Option<&ColumnMetadata> {
        match path.split_once('.') {
            None => self.find_column(path),
            Some((embedded, rest)) => self
                .find_embedded(embedded)?
                .columns
                .iter()
                .find(|c| c.property == rest),
        }
    }

    /// Follows a chain of relation properties from this entity.
    #[must_use]
    pub fn find_relation_path<'a, I>(&self, path: I) -> Option<&RelationMetadata>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut entity = self;
        let mut found = None;
        for segment in path {
            let relation = entity.find_relation(segment)?;
            entity = &relation.target;
            found = Some(relation);
        }
        found
    }

    #[must_use]
    pub fn primary_columns(&self) -> Vec<&ColumnMetadata> {
        self.columns.iter().filter(|c| c.primary).collect()
    }

    /// Stored columns, including embedded ones, paired with their property path.
    #[must_use]
    pub fn selectable_columns(&self) -> Vec<(String, &ColumnMetadata)> {
        let mut out: Vec<(String, &ColumnMetadata)> = self
            .columns
            .iter()
            .filter(|c| !c.is_virtual || c.expression.is_some())
            .map(|c| (c.property.clone(), c))
            .collect();
        for embedded in &self.embeddeds {
            for column in &embedded.columns {
                out.push((format!("{}.{}", embedded.property, column.property), column));
            }
        }
        out
    }
}
