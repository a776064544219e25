use crate::domain::account::UserId;
use crate::domain::payment::{ProductRef, SessionRef};
use crate::domain::pricing::Tier;
use crate::domain::request::UpscaleRequest;
use crate::error::{Result, UpscaleError};
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum OpKind {
    Upscale,
    Topup,
}

/// Journaled compute outcome for an upscale row.
#[derive(Debug, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum ComputeOutcome {
    Ok,
    Failed,
}

/// One raw journal row. Column presence depends on `op`; validation
/// happens in [`OperationRecord::into_operation`].
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct OperationRecord {
    pub op: OpKind,
    pub user: u64,
    pub tier: Option<u8>,
    pub enhance: Option<bool>,
    pub session: Option<String>,
    pub product: Option<String>,
    pub amount: Option<i64>,
    pub paid: Option<bool>,
    pub outcome: Option<ComputeOutcome>,
}

/// A validated journal operation.
#[derive(Debug, PartialEq, Clone)]
pub enum Operation {
    Upscale {
        user: UserId,
        request: UpscaleRequest,
        outcome: ComputeOutcome,
    },
    Topup {
        user: UserId,
        session: SessionRef,
        product: ProductRef,
        amount: i64,
        paid: bool,
    },
}

impl OperationRecord {
    pub fn into_operation(self) -> Result<Operation> {
        let user = UserId(self.user);
        match self.op {
            OpKind::Upscale => {
                let factor = self
                    .tier
                    .ok_or_else(|| missing("tier", "upscale"))?;
                Ok(Operation::Upscale {
                    user,
                    request: UpscaleRequest {
                        tier: Tier::from_factor(factor)?,
                        enhance: self.enhance.unwrap_or(false),
                    },
                    outcome: self.outcome.unwrap_or(ComputeOutcome::Ok),
                })
            }
            OpKind::Topup => Ok(Operation::Topup {
                user,
                session: SessionRef(
                    self.session.ok_or_else(|| missing("session", "topup"))?,
                ),
                product: ProductRef(
                    self.product.ok_or_else(|| missing("product", "topup"))?,
                ),
                amount: self.amount.ok_or_else(|| missing("amount", "topup"))?,
                paid: self.paid.ok_or_else(|| missing("paid", "topup"))?,
            }),
        }
    }
}

fn missing(column: &str, op: &str) -> UpscaleError {
    UpscaleError::MalformedOperation(format!("{op} row without {column}"))
}

/// Reads journal operations from a CSV source.
///
/// Wraps `csv::Reader` with whitespace trimming and flexible record
/// lengths, yielding validated operations lazily so large journals stream.
pub struct OperationReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> OperationReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    pub fn operations(self) -> impl Iterator<Item = Result<Operation>> {
        self.reader.into_deserialize().map(|result| {
            result
                .map_err(UpscaleError::from)
                .and_then(OperationRecord::into_operation)
        })
    }
}
