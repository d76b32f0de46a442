//! Message redaction driven by a decision's masked-trait map.
//!
//! The masking engine substitutes replacement tokens at the sensitive
//! spans scanners detected, for exactly the traits the decision says to
//! mask. It never decides anything itself: a denied decision turns the
//! whole message into the denial text, an allowed decision with no
//! applicable masks passes the message through unchanged.

use warden_types::{AnalyzerSpan, Decision};

/// Message shown in place of content when access is denied and the
/// decision carries no reason of its own.
pub const DEFAULT_DENIAL_MESSAGE: &str = "Access denied by policy";

/// The result of masking one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskOutcome {
    /// The response text: masked content, the original message, or the
    /// denial message.
    pub text: String,
    /// The spans that were substituted, offset for audit fidelity.
    ///
    /// Positions are the scanner's positions plus the caller's base
    /// offset; they locate the finding in the full stream, not in the
    /// masked output.
    pub audit_spans: Vec<AnalyzerSpan>,
}

/// Applies decisions to message content.
#[derive(Debug, Default, Clone, Copy)]
pub struct MaskingEngine;

impl MaskingEngine {
    pub fn new() -> Self {
        Self
    }

    /// Masks a single message according to the decision.
    ///
    /// `spans` are the scanner findings for this message fragment, with
    /// byte offsets local to `message`. `base_offset` is the length of the
    /// stream content that preceded this fragment; it shifts the audit
    /// span positions and nothing else. Spans are assumed non-overlapping
    /// (a scanner contract); overlapping, out-of-bounds, and
    /// non-char-boundary spans are skipped rather than producing torn
    /// output or a panic.
    ///
    /// Masking is a pure function of (message, decision, spans): applying
    /// it twice yields the same outcome.
    pub fn mask_message(
        &self,
        message: &str,
        decision: &Decision,
        spans: &[AnalyzerSpan],
        base_offset: usize,
    ) -> MaskOutcome {
        if !decision.authorized {
            // Nothing left to mask once access is denied.
            let text = decision
                .reason
                .clone()
                .unwrap_or_else(|| DEFAULT_DENIAL_MESSAGE.to_string());
            return MaskOutcome {
                text,
                audit_spans: Vec::new(),
            };
        }

        let mut applicable: Vec<&AnalyzerSpan> = spans
            .iter()
            .filter(|s| decision.masked_traits.contains_key(&s.trait_name))
            .filter(|s| s.start < s.end && s.end <= message.len())
            .filter(|s| message.is_char_boundary(s.start) && message.is_char_boundary(s.end))
            .collect();
        applicable.sort_by_key(|s| s.start);

        if applicable.is_empty() {
            return MaskOutcome {
                text: message.to_string(),
                audit_spans: Vec::new(),
            };
        }

        let mut text = String::with_capacity(message.len());
        let mut audit_spans = Vec::with_capacity(applicable.len());
        let mut cursor = 0;

        for span in applicable {
            if span.start < cursor {
                continue;
            }
            let token = &decision.masked_traits[&span.trait_name];
            text.push_str(&message[cursor..span.start]);
            text.push_str(token);
            cursor = span.end;

            audit_spans.push(AnalyzerSpan::new(
                span.trait_name.clone(),
                span.start + base_offset,
                span.end + base_offset,
            ));
        }
        text.push_str(&message[cursor..]);

        MaskOutcome { text, audit_spans }
    }
}
