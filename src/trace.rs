// src/trace.rs
//! Call-trace parsing and contract-creation extraction.
//!
//! Walking the trace is the reliable way to find new contracts: it includes
//! contracts deployed by other contracts, which never show up as a
//! transaction with an empty `to`.

use crate::error::TraceError;
use crate::retry::RetryPolicy;
use crate::rpc::ChainReader;
use alloy::primitives::{Address, B256};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallKind {
    Call,
    StaticCall,
    DelegateCall,
    CallCode,
    Create,
    Create2,
    SelfDestruct,
    Other(String),
}

impl CallKind {
    fn parse(kind: &str) -> Self {
        match kind.to_ascii_uppercase().as_str() {
            "CALL" => CallKind::Call,
            "STATICCALL" => CallKind::StaticCall,
            "DELEGATECALL" => CallKind::DelegateCall,
            "CALLCODE" => CallKind::CallCode,
            "CREATE" => CallKind::Create,
            "CREATE2" => CallKind::Create2,
            "SELFDESTRUCT" => CallKind::SelfDestruct,
            other => CallKind::Other(other.to_string()),
        }
    }

    pub fn is_create(&self) -> bool {
        matches!(self, CallKind::Create | CallKind::Create2)
    }
}

/// One frame of a `callTracer` result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallFrame {
    pub kind: CallKind,
    /// For CREATE/CREATE2 this is the address of the new contract.
    pub to: Option<Address>,
    pub calls: Vec<CallFrame>,
}

/// A frame whose children are still being converted.
struct PendingFrame<'a> {
    kind: CallKind,
    to: Option<Address>,
    children: std::slice::Iter<'a, Value>,
    calls: Vec<CallFrame>,
}

impl<'a> PendingFrame<'a> {
    fn open(value: &'a Value) -> Self {
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .map(CallKind::parse)
            .unwrap_or_else(|| CallKind::Other(String::new()));

        let to = value
            .get("to")
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<Address>().ok());

        let children = value
            .get("calls")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
            .iter();

        Self {
            kind,
            to,
            children,
            calls: Vec::new(),
        }
    }

    fn close(self) -> CallFrame {
        CallFrame {
            kind: self.kind,
            to: self.to,
            calls: self.calls,
        }
    }
}

impl CallFrame {
    /// Lenient conversion from tracer JSON: unknown types, bad addresses and
    /// malformed `calls` entries degrade to "nothing" instead of failing.
    /// Iterative, so nesting depth is bounded only by memory.
    pub fn from_json(value: &Value) -> Self {
        let mut stack = vec![PendingFrame::open(value)];

        loop {
            let next = stack
                .last_mut()
                .and_then(|top| top.children.find(|c| c.is_object()));
            if let Some(child) = next {
                stack.push(PendingFrame::open(child));
                continue;
            }

            // every child of the top frame is converted
            let frame = match stack.pop() {
                Some(done) => done.close(),
                None => return PendingFrame::open(&Value::Null).close(),
            };
            match stack.last_mut() {
                Some(parent) => parent.calls.push(frame),
                None => return frame,
            }
        }
    }
}

/// Parse raw tracer output with no nesting limit. The EVM allows 1024 nested
/// calls, each adding two JSON levels.
pub fn parse_call_tree(raw: &str) -> Result<CallFrame, serde_json::Error> {
    let mut de = serde_json::Deserializer::from_str(raw);
    de.disable_recursion_limit();
    let value = Value::deserialize(serde_stacker::Deserializer::new(&mut de))?;
    de.end()?;
    Ok(CallFrame::from_json(&value))
}

/// Addresses of every CREATE/CREATE2 frame, depth-first pre-order, root included.
pub fn created_contracts(root: &CallFrame) -> Vec<Address> {
    let mut found = Vec::new();
    let mut stack = vec![root];

    while let Some(frame) = stack.pop() {
        if frame.kind.is_create() {
            if let Some(to) = frame.to {
                found.push(to);
            }
        }
        // reversed so the first child is visited next
        stack.extend(frame.calls.iter().rev());
    }

    found
}

/// Fetches call traces through the debug API.
#[derive(Clone)]
pub struct Tracer {
    chain: Arc<dyn ChainReader>,
    retry: RetryPolicy,
}

impl Tracer {
    pub fn new(chain: Arc<dyn ChainReader>, retry: RetryPolicy) -> Self {
        Self { chain, retry }
    }

    pub async fn trace(&self, hash: B256) -> Result<CallFrame, TraceError> {
        let raw = self
            .retry
            .run("debug_traceTransaction", || self.chain.trace_call_tree(hash))
            .await
            .map_err(|(source, attempts)| TraceError::Rpc {
                hash,
                attempts,
                source,
            })?;

        debug!("Traced {} ({} bytes)", hash, raw.get().len());
        // a malformed trace will not improve on retry
        parse_call_tree(raw.get()).map_err(|e| TraceError::Malformed {
            hash,
            reason: e.to_string(),
        })
    }

    /// Trace `hash` and return the contracts it created.
    pub async fn find_created_contracts(&self, hash: B256) -> Result<Vec<Address>, TraceError> {
        let root = self.trace(hash).await?;
        Ok(created_contracts(&root))
    }
}
