//! Terminal input parsing.
//!
//! Lines starting with `/` are commands; anything else is a chat message.

use std::path::{Path, PathBuf};

/// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Plain text to send (may be empty when only an image is attached).
    Send(String),
    AttachFile(PathBuf),
    OpenCamera,
    FlipCamera,
    Capture,
    CloseCamera,
    ClearAttachment,
    Reset,
    Continue,
    EndSession,
    Help,
    Quit,
    Unknown(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let line = line.trim_end_matches(&['\r', '\n'][..]);
        let Some(rest) = line.trim_start().strip_prefix('/') else {
            return Command::Send(line.to_string());
        };

        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest, ""),
        };

        match name {
            "file" | "adjuntar" if !arg.is_empty() => Command::AttachFile(PathBuf::from(arg)),
            "camera" | "camara" => Command::OpenCamera,
            "flip" => Command::FlipCamera,
            "snap" | "foto" => Command::Capture,
            "cancel" => Command::CloseCamera,
            "clear" => Command::ClearAttachment,
            "reset" => Command::Reset,
            "continue" | "seguir" => Command::Continue,
            "end" | "terminar" => Command::EndSession,
            "send" => Command::Send(arg.to_string()),
            "help" | "?" => Command::Help,
            "quit" | "exit" | "salir" => Command::Quit,
            _ => Command::Unknown(name.to_string()),
        }
    }

    /// Whether this command counts as user activity for idle detection.
    pub fn is_activity(&self) -> bool {
        !matches!(self, Command::Help | Command::Quit | Command::Unknown(_))
    }
}

pub const HELP: &str = "\
Comandos:
  <texto>          enviar consulta
  /send            enviar solo la imagen adjunta
  /file <ruta>     adjuntar una imagen desde disco
  /camera          abrir la cámara
  /flip            cambiar entre cámara frontal y trasera
  /snap            capturar foto
  /cancel          cerrar la cámara
  /clear           quitar la imagen adjunta
  /reset           reiniciar la conversación
  /continue, /end  responder al aviso de inactividad
  /quit            salir";

/// MIME type for an image file, from its extension.
pub fn image_mime_type(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "heic" => "image/heic",
        "heif" => "image/heif",
        "tif" | "tiff" => "image/tiff",
        "avif" => "image/avif",
        _ => return None,
    };
    Some(mime)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_send() {
        assert_eq!(
            Command::parse("¿Qué es el ibuprofeno?\n"),
            Command::Send("¿Qué es el ibuprofeno?".to_string())
        );
        assert_eq!(Command::parse("   "), Command::Send("   ".to_string()));
    }

    #[test]
    fn test_commands() {
        assert_eq!(
            Command::parse("/file  fotos/caja.jpg "),
            Command::AttachFile(PathBuf::from("fotos/caja.jpg"))
        );
        assert_eq!(Command::parse("/file"), Command::Unknown("file".into()));
        assert_eq!(Command::parse("/camera"), Command::OpenCamera);
        assert_eq!(Command::parse("/snap"), Command::Capture);
        assert_eq!(Command::parse("/send"), Command::Send(String::new()));
        assert_eq!(Command::parse("/salir"), Command::Quit);
        assert_eq!(Command::parse("/nope"), Command::Unknown("nope".into()));
    }

    #[test]
    fn test_activity_classification() {
        assert!(Command::Send("hola".into()).is_activity());
        assert!(Command::OpenCamera.is_activity());
        assert!(!Command::Help.is_activity());
        assert!(!Command::Quit.is_activity());
    }

    #[test]
    fn test_image_mime_type() {
        assert_eq!(image_mime_type(Path::new("a/b.JPG")), Some("image/jpeg"));
        assert_eq!(image_mime_type(Path::new("caja.png")), Some("image/png"));
        assert_eq!(image_mime_type(Path::new("notas.txt")), None);
        assert_eq!(image_mime_type(Path::new("sin_extension")), None);
    }
}
