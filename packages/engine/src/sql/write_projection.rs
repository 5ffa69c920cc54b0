use sqlparser::ast::{OrderByExpr, Statement};

use crate::schema::SchemaRegistry;
use crate::sql::shadowing::CteShadowing;
use crate::sql::steps::delete::DeleteTransformer;
use crate::sql::steps::insert::InsertTransformer;
use crate::sql::steps::replace::ReplaceTransformer;
use crate::sql::steps::update::UpdateTransformer;
use crate::sql::steps::Projection;
use crate::sql::RewritePlan;
use crate::store::ShadowStore;
use crate::ShadowError;

/// Turns a DML statement into a read of the rows it would write, paired
/// with the mutation that folds those rows into the shadow store.
pub struct WriteProjection<'a> {
    store: &'a ShadowStore,
    registry: &'a SchemaRegistry,
    validate_constraints: bool,
    update_order_by: &'a [OrderByExpr],
}

impl<'a> WriteProjection<'a> {
    pub fn new(store: &'a ShadowStore, registry: &'a SchemaRegistry) -> Self {
        Self {
            store,
            registry,
            validate_constraints: true,
            update_order_by: &[],
        }
    }

    pub fn with_update_order_by(mut self, order_by: &'a [OrderByExpr]) -> Self {
        self.update_order_by = order_by;
        self
    }

    pub fn with_constraint_validation(mut self, validate: bool) -> Self {
        self.validate_constraints = validate;
        self
    }

    /// `sql` is the original text, kept on plans that do not rewrite it.
    pub fn project(&self, sql: &str, statement: &Statement) -> Result<RewritePlan, ShadowError> {
        let projection = match statement {
            Statement::Insert(insert) if insert.replace_into => {
                ReplaceTransformer::new(self.store, self.registry).transform(insert)?
            }
            Statement::Insert(insert) => InsertTransformer::new(self.store, self.registry)
                .with_constraint_validation(self.validate_constraints)
                .transform(insert)?,
            Statement::Update(update) => UpdateTransformer::new(self.store, self.registry)
                .with_order_by(self.update_order_by)
                .transform(update)?,
            Statement::Delete(delete) => {
                DeleteTransformer::new(self.store, self.registry).transform(delete)?
            }
            _ => {
                return Err(ShadowError::Unsupported(format!(
                    "not a row-writing statement: {statement}"
                )))
            }
        };

        match projection {
            Projection::Select { sql: select, mutation } => {
                let shadowed = CteShadowing::new(self.store, self.registry).apply(&select)?;
                Ok(RewritePlan::write(shadowed, mutation))
            }
            Projection::UnknownSchema(table) => Ok(RewritePlan::unknown_schema(sql, table)),
            Projection::Forbidden => Ok(RewritePlan::forbidden(sql)),
        }
    }
}
