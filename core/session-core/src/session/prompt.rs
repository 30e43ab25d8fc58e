//! Stdin prompt resolution.
//!
//! A prompt is answered exactly once, and only the most recent prompt is
//! actionable: the remote process blocks on input, so an older unresolved
//! prompt can no longer be satisfied. Every check runs before the single
//! in-place write, so a failed resolution leaves the transcript untouched.

use serde::{Deserialize, Serialize};

use crate::error::ConsistencyError;
use crate::session::transcript::{Transcript, TranscriptEntry};

/// A caller's captured view of a prompt entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptRef {
    pub generation: u64,
    pub index: usize,
    pub prompt: String,
}

/// Captures a reference to the prompt at `index`.
pub fn prompt_ref(
    transcript: &Transcript,
    generation: u64,
    index: usize,
) -> Result<PromptRef, ConsistencyError> {
    match transcript.get(index) {
        Some(TranscriptEntry::Stdin(prompt)) => Ok(PromptRef {
            generation,
            index,
            prompt: prompt.prompt().to_string(),
        }),
        Some(other) => Err(ConsistencyError::NotAPrompt {
            index,
            found: other.kind(),
        }),
        None => Err(ConsistencyError::IndexOutOfBounds {
            index,
            len: transcript.len(),
        }),
    }
}

/// The actionable prompt, if any.
pub fn pending_prompt(transcript: &Transcript, generation: u64) -> Option<PromptRef> {
    let index = transcript.pending_prompt_index()?;
    prompt_ref(transcript, generation, index).ok()
}

/// Checks `captured` against the transcript and writes `response` into it.
pub(crate) fn resolve(
    transcript: &mut Transcript,
    generation: u64,
    captured: &PromptRef,
    response: String,
) -> Result<(), ConsistencyError> {
    if captured.generation != generation {
        return Err(ConsistencyError::StaleGeneration {
            captured: captured.generation,
            current: generation,
        });
    }

    let index = captured.index;
    let current = transcript.pending_prompt_index();
    let len = transcript.len();
    let prompt = match transcript.get_mut(index) {
        Some(TranscriptEntry::Stdin(prompt)) => prompt,
        Some(other) => {
            return Err(ConsistencyError::NotAPrompt {
                index,
                found: other.kind(),
            })
        }
        None => return Err(ConsistencyError::IndexOutOfBounds { index, len }),
    };

    if prompt.prompt() != captured.prompt {
        return Err(ConsistencyError::StaleIndex { index });
    }
    if prompt.is_resolved() {
        return Err(ConsistencyError::AlreadyResolved { index });
    }
    if current != Some(index) {
        return Err(ConsistencyError::NotCurrentPrompt { index, current });
    }

    prompt.set_response(response);
    Ok(())
}
