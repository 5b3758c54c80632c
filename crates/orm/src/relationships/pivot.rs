//! Pivot models - rows of a many-to-many intermediate table

use crate::model::{Model, ModelBase};
use crate::relations;

/// Model usable as the pivot of a [`BelongsToMany`](super::BelongsToMany) relation
pub trait PivotModel: Model {
    /// Table of a custom pivot type; when set it wins over the relation's table
    fn pivot_table() -> Option<&'static str> {
        None
    }
}

/// Generic pivot row, its table is set by the relation that hydrates it
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pivot {
    base: ModelBase,
}

impl Model for Pivot {
    fn table_name() -> &'static str {
        "pivot"
    }

    fn base(&self) -> &ModelBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ModelBase {
        &mut self.base
    }

    fn relations() -> &'static crate::relationships::RelationRegistry<Self> {
        relations!(Pivot {})
    }
}

impl PivotModel for Pivot {}
