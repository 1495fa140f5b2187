use utoipa::OpenApi;

use crate::api;

#[derive(OpenApi)]
#[openapi(
    info(title = "cadis-server", description = "CADIS coding-improvement API"),
    paths(
        api::meta::healthz,
        api::meta::openapi_json,
        api::scenarios::scenarios_list,
        api::scenarios::scenario_get,
        api::attempts::attempts_create,
        api::attempts::attempts_list,
        api::progress::progress_get,
        api::progress::progress_recompute,
        api::cycles::cycles_run,
    ),
    components(schemas(api::progress::RecomputeReq, api::cycles::CyclesReq)),
    tags(
        (name = "Meta", description = "Service metadata"),
        (name = "Coding", description = "Scenarios, attempts, progress and cycles")
    )
)]
pub(crate) struct ApiDoc;
