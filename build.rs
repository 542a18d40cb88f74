//! Generates the `v5api.Btrdb` tonic client and server from a hand-declared
//! service description. Message types live in `src/proto.rs`, so no `protoc`
//! is needed at build time.

use tonic_build::manual::{Builder, Method, Service};

const CODEC: &str = "tonic_prost::ProstCodec";

/// `(method name, route name, request type, response type, server streaming)`
const METHODS: &[(&str, &str, &str, &str, bool)] = &[
    ("raw_values", "RawValues", "RawValuesParams", "RawValuesResponse", true),
    ("aligned_windows", "AlignedWindows", "AlignedWindowsParams", "AlignedWindowsResponse", true),
    ("windows", "Windows", "WindowsParams", "WindowsResponse", true),
    ("stream_info", "StreamInfo", "StreamInfoParams", "StreamInfoResponse", false),
    ("set_stream_annotations", "SetStreamAnnotations", "SetStreamAnnotationsParams", "SetStreamAnnotationsResponse", false),
    ("set_stream_tags", "SetStreamTags", "SetStreamTagsParams", "SetStreamTagsResponse", false),
    ("create", "Create", "CreateParams", "CreateResponse", false),
    ("list_collections", "ListCollections", "ListCollectionsParams", "ListCollectionsResponse", true),
    ("lookup_streams", "LookupStreams", "LookupStreamsParams", "LookupStreamsResponse", true),
    ("nearest", "Nearest", "NearestParams", "NearestResponse", false),
    ("changes", "Changes", "ChangesParams", "ChangesResponse", true),
    ("insert", "Insert", "InsertParams", "InsertResponse", false),
    ("delete", "Delete", "DeleteParams", "DeleteResponse", false),
    ("info", "Info", "InfoParams", "InfoResponse", false),
    ("fault_inject", "FaultInject", "FaultInjectParams", "FaultInjectResponse", false),
    ("flush", "Flush", "FlushParams", "FlushResponse", false),
    ("obliterate", "Obliterate", "ObliterateParams", "ObliterateResponse", false),
    ("get_metadata_usage", "GetMetadataUsage", "MetadataUsageParams", "MetadataUsageResponse", false),
    ("generate_csv", "GenerateCSV", "GenerateCsvParams", "GenerateCsvResponse", true),
    ("sql_query", "SQLQuery", "SqlQueryParams", "SqlQueryResponse", true),
];

fn main() {
    let mut service = Service::builder().name("Btrdb").package("v5api");

    for &(name, route, input, output, streaming) in METHODS {
        let mut method = Method::builder()
            .name(name)
            .route_name(route)
            .input_type(format!("crate::proto::{input}"))
            .output_type(format!("crate::proto::{output}"))
            .codec_path(CODEC);
        if streaming {
            method = method.server_streaming();
        }
        service = service.method(method.build());
    }

    Builder::new().compile(&[service.build()]);

    println!("cargo:rerun-if-changed=build.rs");
}
