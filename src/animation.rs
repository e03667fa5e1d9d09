use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::color_store::ColorBuffer;
use crate::error::ValidationError;

/// A sequence of frames played `loops` times, after which the strip goes back
/// to what it showed before.
///
/// Keys are matched without regard to case, so `Loop`, `LOOP` and `loop` all
/// name the loop count. When two spellings collide the lowercase one wins.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(try_from = "Value")]
pub struct Animation {
    #[serde(rename = "loop")]
    pub loops: u32,
    pub frames: Vec<Frame>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Frame {
    pub leds: ColorBuffer,
    /// Milliseconds to hold this frame
    #[serde(default)]
    pub delay: u64,
}

/// Wire shape once every key has been lowercased
#[derive(Deserialize)]
struct AnimationBody {
    #[serde(rename = "loop", default)]
    loops: u32,
    frames: Vec<Frame>,
}

impl TryFrom<Value> for Animation {
    type Error = serde_json::Error;

    fn try_from(mut value: Value) -> Result<Self, Self::Error> {
        fold_keys(&mut value);
        let body: AnimationBody = serde_json::from_value(value)?;
        Ok(Animation {
            loops: body.loops,
            frames: body.frames,
        })
    }
}

/// Lowercase every object key, recursively
fn fold_keys(value: &mut Value) {
    match value {
        Value::Object(map) => {
            // keys already in lowercase go last so they win collisions
            let (exact, folded): (Vec<_>, Vec<_>) = std::mem::take(map)
                .into_iter()
                .partition(|(key, _)| *key == key.to_lowercase());
            for (key, mut inner) in folded.into_iter().chain(exact) {
                fold_keys(&mut inner);
                map.insert(key.to_lowercase(), inner);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(fold_keys),
        _ => {}
    }
}

impl Frame {
    pub fn hold(&self) -> Duration {
        Duration::from_millis(self.delay)
    }
}

impl Animation {
    /// Every frame must carry a full buffer
    pub fn validate(&self, buffer_len: usize) -> Result<(), ValidationError> {
        for (index, frame) in self.frames.iter().enumerate() {
            if frame.leds.len() != buffer_len {
                return Err(ValidationError::FrameLength {
                    index,
                    expected: buffer_len,
                    actual: frame.leds.len(),
                });
            }
        }
        Ok(())
    }

    /// Number of buffers playback writes, including the final restore
    pub fn write_count(&self) -> usize {
        self.loops as usize * self.frames.len() + 1
    }

    /// Total time spent holding frames, `Duration::MAX` if that does not fit
    pub fn duration(&self) -> Duration {
        self.frames
            .iter()
            .try_fold(Duration::ZERO, |total, frame| total.checked_add(frame.hold()))
            .and_then(|one_pass| one_pass.checked_mul(self.loops))
            .unwrap_or(Duration::MAX)
    }
}
