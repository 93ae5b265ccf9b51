use thiserror::Error;

#[derive(Error, Debug)]
pub enum TextdubError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Scene detection error: {0}")]
    Scene(String),

    #[error("Text recognition error: {0}")]
    Recognize(String),

    #[error("Translation service error: {0}")]
    Translation(String),

    #[error("No layout fits region {width}x{height} for text of {chars} chars")]
    LayoutOverflow {
        width: u32,
        height: u32,
        chars: usize,
    },

    #[error("Could not read frame {0} from video source")]
    SourceRead(u64),

    #[error("Media processing error: {0}")]
    Media(String),

    #[error("Inpainting error: {0}")]
    Inpaint(String),

    #[error("Font error: {0}")]
    Font(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File not found: {0}")]
    FileNotFound(String),
}

pub type Result<T> = std::result::Result<T, TextdubError>;
