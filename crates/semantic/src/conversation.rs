use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::{DynamicImage, ImageFormat};
use serde::Serialize;

use crate::{ModelError, ModelErrorKind, ModelInputs, VideoInput};

pub const DEFAULT_INSTRUCTION: &str = "Represent the user's input.";
const SYSTEM_PROMPT: [&str; 2] = [
    "You are an expert at creating and understanding embeddings.",
    "Your task is to provide embeddings for the given user input.",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Turn {
    pub role: &'static str,
    pub content: Vec<ContentPart>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentPart {
    Text {
        text: String,
    },
    Video {
        video: VideoPayload,
        #[serde(skip_serializing_if = "Option::is_none")]
        fps: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        max_frames: Option<usize>,
    },
    Image {
        image: String,
    },
}

/// A URI for the runtime's reader, or inline PNG frames as data URIs.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum VideoPayload {
    Uri(String),
    Frames(Vec<String>),
}

/// Build the two-turn chat the embedding model expects for one input.
pub fn format_conversation(input: &ModelInputs) -> Result<Vec<Turn>, ModelError> {
    let instruction = input
        .instruction
        .as_deref()
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_INSTRUCTION);

    let mut content = vec![ContentPart::Text {
        text: instruction.to_string(),
    }];

    if let Some(video) = &input.video {
        let payload = match video {
            VideoInput::Path(path) => VideoPayload::Uri(to_uri(&path.to_string_lossy())),
            VideoInput::Frames(frames) => VideoPayload::Frames(
                frames.iter().map(png_data_uri).collect::<Result<_, _>>()?,
            ),
        };
        content.push(ContentPart::Video {
            video: payload,
            fps: input.fps,
            max_frames: input.max_frames,
        });
    }

    if let Some(image) = input.image.as_deref().filter(|s| !s.is_empty()) {
        content.push(ContentPart::Image {
            image: to_uri(image),
        });
    }

    if let Some(text) = input.text.as_deref().filter(|s| !s.is_empty()) {
        content.push(ContentPart::Text {
            text: text.to_string(),
        });
    }

    let system = Turn {
        role: "system",
        content: SYSTEM_PROMPT
            .iter()
            .map(|text| ContentPart::Text {
                text: (*text).to_string(),
            })
            .collect(),
    };
    let user = Turn {
        role: "user",
        content,
    };
    Ok(vec![system, user])
}

/// Format a batch. Inputs carrying decoded frames are PNG-encoded on the
/// blocking pool; path and text inputs are formatted in place.
pub async fn format_conversations(inputs: &[ModelInputs]) -> Result<Vec<Vec<Turn>>, ModelError> {
    let has_frames = inputs
        .iter()
        .any(|input| matches!(input.video, Some(VideoInput::Frames(_))));
    if !has_frames {
        return inputs.iter().map(format_conversation).collect();
    }

    let owned = inputs.to_vec();
    tokio::task::spawn_blocking(move || {
        owned
            .iter()
            .map(format_conversation)
            .collect::<Result<Vec<_>, _>>()
    })
    .await
    .map_err(|err| {
        ModelError::new(
            ModelErrorKind::Other,
            format!("frame encode task failed: {err}"),
        )
    })?
}

/// Remote locations pass through; everything else becomes a `file://` URI.
fn to_uri(location: &str) -> String {
    if location.starts_with("http") || location.starts_with("oss") {
        location.to_string()
    } else {
        format!("file://{location}")
    }
}

fn png_data_uri(frame: &DynamicImage) -> Result<String, ModelError> {
    let mut buf = Vec::new();
    frame
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|err| ModelError::new(ModelErrorKind::Other, format!("frame encode failed: {err}")))?;
    Ok(format!("data:image/png;base64,{}", STANDARD.encode(&buf)))
}
