//! Token-budgeted context packing.
//!
//! Blocks are visited in descending priority (input order breaks ties). A
//! block that fits is included whole. A block that does not fit is truncated
//! to the remaining budget with a trailing `...` when at least
//! [`MIN_TRUNCATION_TOKENS`] remain, and packing stops there. With less than
//! that left, packing stops without the block. Atomic blocks are never
//! truncated: when one does not fit it is skipped and packing continues.

/// Minimum remaining budget for a truncated slice to be worth including
pub const MIN_TRUNCATION_TOKENS: usize = 100;

const ELLIPSIS: &str = "...";

/// Estimated token count: `ceil(utf8_len / 4)`.
pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(4)
}

/// A prioritized unit of content to pack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextBlock {
    pub label: String,
    pub content: String,
    pub priority: i32,
    /// Include whole or not at all
    pub atomic: bool,
}

impl ContextBlock {
    pub fn new(label: impl Into<String>, content: impl Into<String>, priority: i32) -> Self {
        Self {
            label: label.into(),
            content: content.into(),
            priority,
            atomic: false,
        }
    }

    pub fn atomic(mut self) -> Self {
        self.atomic = true;
        self
    }
}

/// A block that made it into the packed output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedBlock {
    /// Position of the block in the packer input
    pub index: usize,
    pub label: String,
    pub content: String,
    pub tokens: usize,
    pub truncated: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackedContext {
    pub blocks: Vec<PackedBlock>,
    pub token_count: usize,
}

impl PackedContext {
    pub fn block(&self, index: usize) -> Option<&PackedBlock> {
        self.blocks.iter().find(|b| b.index == index)
    }

    pub fn is_truncated(&self) -> bool {
        self.blocks.iter().any(|b| b.truncated)
    }
}

/// Pack `blocks` into at most `max_tokens` estimated tokens.
pub fn pack(blocks: &[ContextBlock], max_tokens: usize) -> PackedContext {
    let mut order: Vec<usize> = (0..blocks.len()).collect();
    order.sort_by(|a, b| blocks[*b].priority.cmp(&blocks[*a].priority));

    let mut packed = PackedContext::default();
    let mut remaining = max_tokens;

    for index in order {
        let block = &blocks[index];
        let tokens = estimate_tokens(&block.content);

        if tokens <= remaining {
            remaining -= tokens;
            packed.token_count += tokens;
            packed.blocks.push(PackedBlock {
                index,
                label: block.label.clone(),
                content: block.content.clone(),
                tokens,
                truncated: false,
            });
            continue;
        }

        if block.atomic {
            tracing::debug!(label = %block.label, tokens, remaining, "atomic block does not fit, skipped");
            continue;
        }

        if remaining >= MIN_TRUNCATION_TOKENS {
            let content = truncate_to_tokens(&block.content, remaining);
            let tokens = estimate_tokens(&content);
            packed.token_count += tokens;
            packed.blocks.push(PackedBlock {
                index,
                label: block.label.clone(),
                content,
                tokens,
                truncated: true,
            });
            tracing::debug!(label = %block.label, tokens, "block truncated, packing stopped");
        }
        break;
    }

    packed
}

/// Cut `text` to a char-boundary prefix that, with the ellipsis, fits `budget` tokens.
fn truncate_to_tokens(text: &str, budget: usize) -> String {
    let max_bytes = (budget * 4).saturating_sub(ELLIPSIS.len());
    let mut end = max_bytes.min(text.len());
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    let mut out = String::with_capacity(end + ELLIPSIS.len());
    out.push_str(&text[..end]);
    out.push_str(ELLIPSIS);
    out
}
