use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::modules::conversion::handler::convert,
    ),
    components(
        schemas(
            crate::common::response::ErrorResponse,
            crate::modules::conversion::dto::ConvertUpload,
        )
    ),
    tags(
        (name = "Conversion", description = "Audio conversion through the remote transcoder")
    )
)]
pub struct ApiDoc;
