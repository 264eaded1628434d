use actix_web::{web, HttpResponse};
use log::error;

use crate::app_state::AppState;
use crate::attachment::is_safe_file_name;
use crate::error::AppError;

/// GET /uploads/{file_name}
pub async fn serve_upload(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let file_name = path.into_inner();
    if !is_safe_file_name(&file_name) {
        return Err(AppError::not_found("File"));
    }

    let file_path = data.attachments.dir().join(&file_name);
    match tokio::fs::read(&file_path).await {
        Ok(bytes) => {
            let mime = mime_guess::from_path(&file_path).first_or_octet_stream();
            Ok(HttpResponse::Ok().content_type(mime.as_ref()).body(bytes))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(AppError::not_found("File")),
        Err(e) => {
            error!("Error reading upload {}: {}", file_path.display(), e);
            Err(AppError::Internal(format!("reading upload: {}", e)))
        }
    }
}
