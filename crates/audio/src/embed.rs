use std::fs;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::AudioError;

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbedMode {
    /// The file is base64-encoded into a data URL.
    #[default]
    Inline,
    /// The player points at the file path.
    Reference,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EmbedOptions {
    pub width: String,
    pub height: String,
    pub autoplay: bool,
    #[serde(rename = "loop")]
    pub loop_playback: bool,
    pub mode: EmbedMode,
}

impl Default for EmbedOptions {
    fn default() -> Self {
        Self {
            width: "300px".into(),
            height: "300px".into(),
            autoplay: true,
            loop_playback: true,
            mode: EmbedMode::Inline,
        }
    }
}

pub fn mime_type_for(path: &Path) -> Result<&'static str, AudioError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match extension.as_str() {
        "wav" => Ok("audio/wav"),
        "mp3" => Ok("audio/mpeg"),
        "ogg" => Ok("audio/ogg"),
        "flac" => Ok("audio/flac"),
        "m4a" => Ok("audio/mp4"),
        _ => Err(AudioError::UnsupportedFormat(extension)),
    }
}

/// Render an `<audio>` player for a staged file.
///
/// The literal path is always carried in `data-source`; the `src` is either a
/// base64 data URL or the path itself depending on [`EmbedMode`].
pub fn audio_to_html(path: &Path, options: &EmbedOptions) -> Result<String, AudioError> {
    let mime = mime_type_for(path)?;
    let display_path = path.to_string_lossy();
    let src = match options.mode {
        EmbedMode::Inline => {
            let bytes = fs::read(path).map_err(|err| AudioError::io(path, err))?;
            format!("data:{mime};base64,{}", STANDARD.encode(bytes))
        }
        EmbedMode::Reference => {
            fs::File::open(path).map_err(|err| AudioError::io(path, err))?;
            escape_attribute(&display_path)
        }
    };

    let mut html = String::from("<audio controls");
    html.push_str(&format!(
        " width=\"{}\" height=\"{}\"",
        escape_attribute(&options.width),
        escape_attribute(&options.height)
    ));
    if options.autoplay {
        html.push_str(" autoplay");
    }
    if options.loop_playback {
        html.push_str(" loop");
    }
    html.push_str(&format!(
        " data-source=\"{}\"><source src=\"{}\" type=\"{}\"></audio>",
        escape_attribute(&display_path),
        src,
        mime
    ));
    Ok(html)
}

fn escape_attribute(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::AudioMaterializer;
    use vocalabel_domain::RecordId;

    fn staged_clip(dir: &Path) -> std::path::PathBuf {
        AudioMaterializer::new(dir)
            .materialize(&RecordId::Index(3), &[0.0, 0.1, -0.1], 16_000)
            .unwrap()
            .path
    }

    #[test]
    fn inline_snippet_embeds_data_url_and_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = staged_clip(dir.path());
        let html = audio_to_html(&path, &EmbedOptions::default()).unwrap();

        assert!(html.starts_with("<audio controls"));
        assert!(html.contains("width=\"300px\" height=\"300px\""));
        assert!(html.contains(" autoplay"));
        assert!(html.contains(" loop"));
        assert!(html.contains("audio_3.wav"));
        assert!(html.contains("src=\"data:audio/wav;base64,UklGR"));
        assert!(html.ends_with("</audio>"));
    }

    #[test]
    fn flags_are_omitted_when_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let path = staged_clip(dir.path());
        let options = EmbedOptions {
            width: "120px".into(),
            height: "40px".into(),
            autoplay: false,
            loop_playback: false,
            mode: EmbedMode::Reference,
        };
        let html = audio_to_html(&path, &options).unwrap();
        assert!(html.contains("width=\"120px\" height=\"40px\""));
        assert!(!html.contains("autoplay"));
        assert!(!html.contains(" loop"));
        assert!(html.contains(&format!("src=\"{}\"", path.display())));
    }

    #[test]
    fn missing_file_fails_in_both_modes() {
        let missing = Path::new("definitely/missing/audio_1.wav");
        for mode in [EmbedMode::Inline, EmbedMode::Reference] {
            let options = EmbedOptions {
                mode,
                ..Default::default()
            };
            assert!(matches!(
                audio_to_html(missing, &options),
                Err(AudioError::Io { .. })
            ));
        }
    }

    #[test]
    fn unknown_extension_is_rejected() {
        assert!(matches!(
            mime_type_for(Path::new("clip.txt")),
            Err(AudioError::UnsupportedFormat(_))
        ));
        assert_eq!(mime_type_for(Path::new("clip.MP3")).unwrap(), "audio/mpeg");
    }

    #[test]
    fn attributes_are_escaped() {
        assert_eq!(escape_attribute("a\"b<c>&"), "a&quot;b&lt;c&gt;&amp;");
    }
}
