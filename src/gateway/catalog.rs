use super::router::Gateway;
use crate::proto::*;

/// URL names of every operation, `POST /v5/<name>`.
pub const OPERATIONS: [&str; 20] = [
    "rawvalues",
    "alignedwindows",
    "windows",
    "streaminfo",
    "setstreamannotations",
    "setstreamtags",
    "create",
    "listcollections",
    "lookupstreams",
    "nearest",
    "changes",
    "insert",
    "delete",
    "info",
    "faultinject",
    "flush",
    "obliterate",
    "getmetadatausage",
    "generatecsv",
    "sqlquery",
];

impl Gateway {
    pub(super) fn register_catalog(&mut self) {
        self.streaming::<RawValuesParams, RawValuesResponse, _, _>(
            "rawvalues",
            |mut c, r| async move { c.raw_values(r).await },
        );
        self.streaming::<AlignedWindowsParams, AlignedWindowsResponse, _, _>(
            "alignedwindows",
            |mut c, r| async move { c.aligned_windows(r).await },
        );
        self.streaming::<WindowsParams, WindowsResponse, _, _>(
            "windows",
            |mut c, r| async move { c.windows(r).await },
        );
        self.unary::<StreamInfoParams, StreamInfoResponse, _, _>(
            "streaminfo",
            |mut c, r| async move { c.stream_info(r).await },
        );
        self.unary::<SetStreamAnnotationsParams, SetStreamAnnotationsResponse, _, _>(
            "setstreamannotations",
            |mut c, r| async move { c.set_stream_annotations(r).await },
        );
        self.unary::<SetStreamTagsParams, SetStreamTagsResponse, _, _>(
            "setstreamtags",
            |mut c, r| async move { c.set_stream_tags(r).await },
        );
        self.unary::<CreateParams, CreateResponse, _, _>(
            "create",
            |mut c, r| async move { c.create(r).await },
        );
        self.streaming::<ListCollectionsParams, ListCollectionsResponse, _, _>(
            "listcollections",
            |mut c, r| async move { c.list_collections(r).await },
        );
        self.streaming::<LookupStreamsParams, LookupStreamsResponse, _, _>(
            "lookupstreams",
            |mut c, r| async move { c.lookup_streams(r).await },
        );
        self.unary::<NearestParams, NearestResponse, _, _>(
            "nearest",
            |mut c, r| async move { c.nearest(r).await },
        );
        self.streaming::<ChangesParams, ChangesResponse, _, _>(
            "changes",
            |mut c, r| async move { c.changes(r).await },
        );
        self.unary::<InsertParams, InsertResponse, _, _>(
            "insert",
            |mut c, r| async move { c.insert(r).await },
        );
        self.unary::<DeleteParams, DeleteResponse, _, _>(
            "delete",
            |mut c, r| async move { c.delete(r).await },
        );
        self.unary::<InfoParams, InfoResponse, _, _>(
            "info",
            |mut c, r| async move { c.info(r).await },
        );
        self.unary::<FaultInjectParams, FaultInjectResponse, _, _>(
            "faultinject",
            |mut c, r| async move { c.fault_inject(r).await },
        );
        self.unary::<FlushParams, FlushResponse, _, _>(
            "flush",
            |mut c, r| async move { c.flush(r).await },
        );
        self.unary::<ObliterateParams, ObliterateResponse, _, _>(
            "obliterate",
            |mut c, r| async move { c.obliterate(r).await },
        );
        self.unary::<MetadataUsageParams, MetadataUsageResponse, _, _>(
            "getmetadatausage",
            |mut c, r| async move { c.get_metadata_usage(r).await },
        );
        self.streaming::<GenerateCsvParams, GenerateCsvResponse, _, _>(
            "generatecsv",
            |mut c, r| async move { c.generate_csv(r).await },
        );
        self.streaming::<SqlQueryParams, SqlQueryResponse, _, _>(
            "sqlquery",
            |mut c, r| async move { c.sql_query(r).await },
        );
    }
}
