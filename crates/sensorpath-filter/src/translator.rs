use sensorpath_model::{EntityModel, EntityTypeDescriptor};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, trace};

use crate::binder::{Binder, BoundExpr};
use crate::error::{FilterError, InvalidFilterExpressionError, InvalidQueryError};
use crate::eval::{self, Filterable};
use crate::expr::{BinaryOp, FilterExpr};
use crate::parser::parse_filter_with;
use crate::settings::FilterSettings;

/// A filter bound to one entity type.
///
/// Evaluates in memory through [`Predicate::evaluate`]; query backends can
/// walk [`Predicate::expr`] instead. Predicates over the same type compose
/// with [`Predicate::and`] and [`Predicate::or`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    entity_type: String,
    root: BoundExpr,
}

impl Predicate {
    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    pub fn expr(&self) -> &BoundExpr {
        &self.root
    }

    /// True only when the filter is definitely true for `entity`; unknown
    /// counts as no match.
    pub fn evaluate(&self, entity: &dyn Filterable) -> bool {
        let matched = eval::matches(&self.root, entity);
        trace!(entity_type = %self.entity_type, matched, "evaluated predicate");
        matched
    }

    pub fn and(self, other: Predicate) -> Result<Predicate, InvalidQueryError> {
        self.combine(BinaryOp::And, other)
    }

    pub fn or(self, other: Predicate) -> Result<Predicate, InvalidQueryError> {
        self.combine(BinaryOp::Or, other)
    }

    fn combine(self, op: BinaryOp, other: Predicate) -> Result<Predicate, InvalidQueryError> {
        if self.entity_type != other.entity_type {
            return Err(InvalidQueryError::EntityTypeMismatch {
                left: self.entity_type,
                right: other.entity_type,
            });
        }
        Ok(Predicate {
            entity_type: self.entity_type,
            root: BoundExpr::Logical {
                op,
                left: Box::new(self.root),
                right: Box::new(other.root),
            },
        })
    }
}

/// Parses and binds `$filter` text against the shared entity model.
#[derive(Debug, Clone)]
pub struct FilterTranslator {
    model: Arc<EntityModel>,
    settings: FilterSettings,
}

impl FilterTranslator {
    pub fn new(model: Arc<EntityModel>, settings: FilterSettings) -> Self {
        Self { model, settings }
    }

    pub fn model(&self) -> &Arc<EntityModel> {
        &self.model
    }

    pub fn parse(&self, text: &str) -> Result<FilterExpr, InvalidFilterExpressionError> {
        parse_filter_with(text, &self.settings)
    }

    pub fn bind(
        &self,
        expr: &FilterExpr,
        entity_type: &EntityTypeDescriptor,
    ) -> Result<Predicate, InvalidQueryError> {
        let root = Binder::new(&self.model).bind(expr, entity_type)?;
        Ok(Predicate {
            entity_type: entity_type.name.clone(),
            root,
        })
    }

    /// Parse and bind in one step. `entity_type` may be a type or
    /// collection name.
    pub fn translate(&self, text: &str, entity_type: &str) -> Result<Predicate, FilterError> {
        let descriptor = self
            .model
            .describe(entity_type)
            .map_err(|_| InvalidQueryError::UnknownEntityType(entity_type.to_string()))?;
        let expr = self.parse(text)?;
        let predicate = self.bind(&expr, descriptor)?;
        debug!(entity_type = %descriptor.name, filter = %text, "translated filter");
        Ok(predicate)
    }
}
