use crate::{config::Config, errors::ApiError};
use actix_web::{HttpResponse, web};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use std::io::Write;
use std::path::{Component, Path};

/// Stores a base64 data-URL image under the uploads dir and returns the
/// URL the message row keeps. Raw bytes never reach the message store.
pub fn store_image(cfg: &Config, data_url: &str) -> Result<String, ApiError> {
    let (meta, payload) = data_url
        .split_once(',')
        .ok_or_else(|| ApiError::BadRequest("invalid image data".into()))?;

    let ext = match meta {
        m if m.starts_with("data:image/png") => "png",
        m if m.starts_with("data:image/jpeg") || m.starts_with("data:image/jpg") => "jpg",
        m if m.starts_with("data:image/gif") => "gif",
        m if m.starts_with("data:image/webp") => "webp",
        _ => return Err(ApiError::BadRequest("unsupported image type".into())),
    };

    let bytes = B64
        .decode(payload.trim())
        .map_err(|_| ApiError::BadRequest("invalid image data".into()))?;
    if bytes.is_empty() {
        return Err(ApiError::BadRequest("empty image".into()));
    }
    if bytes.len() > cfg.max_image_size {
        return Err(ApiError::BadRequest("image too large".into()));
    }

    let name = format!("{}.{}", uuid::Uuid::new_v4(), ext);
    let path = Path::new(&cfg.uploads_dir).join(&name);
    let mut f = std::fs::File::create(&path).map_err(|e| {
        log::error!("image write failed: {e}");
        ApiError::Internal
    })?;
    f.write_all(&bytes).map_err(|e| {
        log::error!("image write failed: {e}");
        ApiError::Internal
    })?;

    Ok(format!("/media/{}", name))
}

pub async fn get_media(
    cfg: web::Data<Config>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let name = path.into_inner();
    // stored names are uuid.ext; anything with a path component is bogus
    if Path::new(&name).components().count() != 1
        || matches!(Path::new(&name).components().next(), Some(Component::ParentDir))
    {
        return Err(ApiError::NotFound);
    }
    let p = Path::new(&cfg.uploads_dir).join(&name);
    let bytes = std::fs::read(&p).map_err(|_| ApiError::NotFound)?;

    let mime = match p.extension().and_then(|e| e.to_str()) {
        Some("png") => "image/png",
        Some("jpg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    };
    Ok(HttpResponse::Ok().content_type(mime).body(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg_with_dir(dir: &Path) -> Config {
        Config {
            uploads_dir: dir.to_string_lossy().into_owned(),
            jwt_secret: Some("s".into()),
            ..Config::default()
        }
    }

    #[test]
    fn stores_png_data_url() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = cfg_with_dir(dir.path());
        let data = format!("data:image/png;base64,{}", B64.encode(b"fakepng"));
        let url = store_image(&cfg, &data).unwrap();
        assert!(url.starts_with("/media/"));
        assert!(url.ends_with(".png"));
        let name = url.strip_prefix("/media/").unwrap();
        assert_eq!(std::fs::read(dir.path().join(name)).unwrap(), b"fakepng");
    }

    #[test]
    fn rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = cfg_with_dir(dir.path());
        assert!(matches!(
            store_image(&cfg, "no comma here"),
            Err(ApiError::BadRequest(_))
        ));
        assert!(matches!(
            store_image(&cfg, "data:text/plain;base64,aGk="),
            Err(ApiError::BadRequest(_))
        ));
        assert!(matches!(
            store_image(&cfg, "data:image/png;base64,%%%"),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn rejects_oversized() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = cfg_with_dir(dir.path());
        cfg.max_image_size = 4;
        let data = format!("data:image/png;base64,{}", B64.encode(b"12345"));
        assert!(matches!(
            store_image(&cfg, &data),
            Err(ApiError::BadRequest(_))
        ));
    }
}
