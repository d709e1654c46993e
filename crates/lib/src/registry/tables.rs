//! Operation tables for each M2X namespace (API v2).
//!
//! Parameter lists follow the client call convention: identifiers first, then
//! `params`/`values`, then `callback`.

use super::descriptor::{Body, Endpoint as E, Operation, QueryArg};

const fn op(name: &'static str, params: &'static [&'static str], endpoint: E) -> Operation {
    Operation::new(name, params, endpoint)
}

const VALUES: Body = Body::Arg("values");
const WRAPPED_VALUES: Body = Body::Wrapped {
    arg: "values",
    key: "values",
};

/// `names` selects the streams to read.
const STREAMS_QUERY: &[QueryArg] = &[
    QueryArg::Merge("params"),
    QueryArg::Named {
        arg: "names",
        key: "streams",
    },
];

pub(super) static DEVICES: &[Operation] = &[
    op("list", &["params", "callback"], E::get("/devices")),
    op("catalog", &["params", "callback"], E::get("/devices/catalog")),
    op("search", &["params", "callback"], E::get("/devices/search")),
    op("create", &["params", "callback"], E::post("/devices")),
    op("tags", &["callback"], E::get("/devices/tags")),
    op("view", &["id", "callback"], E::get("/devices/{id}")),
    op("update", &["id", "values", "callback"], E::put("/devices/{id}").body(VALUES)),
    op("delete", &["id", "callback"], E::delete("/devices/{id}")),
    op("location", &["id", "callback"], E::get("/devices/{id}/location")),
    op(
        "locationHistory",
        &["id", "params", "callback"],
        E::get("/devices/{id}/location/waypoints"),
    ),
    op(
        "updateLocation",
        &["id", "values", "callback"],
        E::put("/devices/{id}/location").body(VALUES),
    ),
    op(
        "deleteLocationHistory",
        &["id", "params", "callback"],
        E::delete("/devices/{id}/location/waypoints"),
    ),
    op("streams", &["id", "callback"], E::get("/devices/{id}/streams")),
    op("stream", &["id", "name", "callback"], E::get("/devices/{id}/streams/{name}")),
    op(
        "updateStream",
        &["id", "name", "params", "callback"],
        E::put("/devices/{id}/streams/{name}"),
    ),
    op(
        "deleteStream",
        &["id", "name", "callback"],
        E::delete("/devices/{id}/streams/{name}"),
    ),
    op(
        "setStreamValue",
        &["id", "name", "values", "callback"],
        E::put("/devices/{id}/streams/{name}/value").body(VALUES),
    ),
    op(
        "streamValues",
        &["id", "name", "params", "callback"],
        E::get("/devices/{id}/streams/{name}/values"),
    ),
    op(
        "streamSampling",
        &["id", "name", "params", "callback"],
        E::get("/devices/{id}/streams/{name}/sampling"),
    ),
    op(
        "streamStats",
        &["id", "name", "params", "callback"],
        E::get("/devices/{id}/streams/{name}/stats"),
    ),
    op(
        "postValues",
        &["id", "name", "values", "callback"],
        E::post("/devices/{id}/streams/{name}/values").body(WRAPPED_VALUES),
    ),
    op(
        "deleteStreamValues",
        &["id", "name", "params", "callback"],
        E::delete("/devices/{id}/streams/{name}/values"),
    ),
    op(
        "postUpdates",
        &["id", "values", "callback"],
        E::post("/devices/{id}/updates").body(WRAPPED_VALUES),
    ),
    op(
        "postUpdate",
        &["id", "values", "callback"],
        E::post("/devices/{id}/update").body(VALUES),
    ),
    op("values", &["id", "params", "callback"], E::get("/devices/{id}/values")),
    op(
        "streamsValues",
        &["id", "names", "params", "callback"],
        E::get("/devices/{id}/values").query(STREAMS_QUERY),
    ),
    op(
        "valuesSearch",
        &["id", "params", "callback"],
        E::get("/devices/{id}/values/search"),
    ),
    op(
        "valuesExport",
        &["id", "params", "callback"],
        E::get("/devices/{id}/values/export.csv"),
    ),
    op("metadata", &["id", "callback"], E::get("/devices/{id}/metadata")),
    op(
        "updateMetadata",
        &["id", "values", "callback"],
        E::put("/devices/{id}/metadata").body(VALUES),
    ),
    op(
        "metadataField",
        &["id", "name", "callback"],
        E::get("/devices/{id}/metadata/{name}"),
    ),
    op(
        "updateMetadataField",
        &["id", "name", "values", "callback"],
        E::put("/devices/{id}/metadata/{name}").body(Body::Wrapped {
            arg: "values",
            key: "value",
        }),
    ),
    op("log", &["id", "callback"], E::get("/devices/{id}/log")),
    op("keys", &["id", "callback"], E::get("/devices/{id}/keys")),
    op("commands", &["id", "params", "callback"], E::get("/devices/{id}/commands")),
    op("triggers", &["id", "callback"], E::get("/devices/{id}/triggers")),
    op(
        "trigger",
        &["id", "triggerId", "callback"],
        E::get("/devices/{id}/triggers/{triggerId}"),
    ),
    op(
        "testTrigger",
        &["id", "triggerName", "callback"],
        E::post("/devices/{id}/triggers/{triggerName}/test"),
    ),
];

pub(super) static DISTRIBUTIONS: &[Operation] = &[
    op("list", &["params", "callback"], E::get("/distributions")),
    op("create", &["params", "callback"], E::post("/distributions")),
    op("view", &["id", "callback"], E::get("/distributions/{id}")),
    op(
        "update",
        &["id", "values", "callback"],
        E::put("/distributions/{id}").body(VALUES),
    ),
    op("delete", &["id", "callback"], E::delete("/distributions/{id}")),
    op(
        "devices",
        &["id", "params", "callback"],
        E::get("/distributions/{id}/devices"),
    ),
    op(
        "addDevice",
        &["id", "serial", "callback"],
        E::post("/distributions/{id}/devices").body(Body::Wrapped {
            arg: "serial",
            key: "serial",
        }),
    ),
    op("dataStreams", &["id", "callback"], E::get("/distributions/{id}/streams")),
    op(
        "dataStream",
        &["id", "name", "callback"],
        E::get("/distributions/{id}/streams/{name}"),
    ),
    op(
        "updateDataStream",
        &["id", "name", "params", "callback"],
        E::put("/distributions/{id}/streams/{name}"),
    ),
    op(
        "deleteDataStream",
        &["id", "name", "callback"],
        E::delete("/distributions/{id}/streams/{name}"),
    ),
    op("metadata", &["id", "callback"], E::get("/distributions/{id}/metadata")),
    op(
        "updateMetadata",
        &["id", "values", "callback"],
        E::put("/distributions/{id}/metadata").body(VALUES),
    ),
    op(
        "metadataField",
        &["id", "name", "callback"],
        E::get("/distributions/{id}/metadata/{name}"),
    ),
];

pub(super) static COLLECTIONS: &[Operation] = &[
    op("list", &["params", "callback"], E::get("/collections")),
    op("create", &["params", "callback"], E::post("/collections")),
    op("view", &["id", "callback"], E::get("/collections/{id}")),
    op(
        "update",
        &["id", "values", "callback"],
        E::put("/collections/{id}").body(VALUES),
    ),
    op("delete", &["id", "callback"], E::delete("/collections/{id}")),
    op(
        "devices",
        &["id", "params", "callback"],
        E::get("/collections/{id}/devices"),
    ),
    op("metadata", &["id", "callback"], E::get("/collections/{id}/metadata")),
    op(
        "updateMetadata",
        &["id", "values", "callback"],
        E::put("/collections/{id}/metadata").body(VALUES),
    ),
    op(
        "metadataField",
        &["id", "name", "callback"],
        E::get("/collections/{id}/metadata/{name}"),
    ),
];

pub(super) static COMMANDS: &[Operation] = &[
    op("list", &["params", "callback"], E::get("/commands")),
    op("send", &["values", "callback"], E::post("/commands").body(VALUES)),
    op("view", &["id", "callback"], E::get("/commands/{id}")),
];

pub(super) static JOBS: &[Operation] = &[
    op("list", &["params", "callback"], E::get("/jobs")),
    op("view", &["id", "callback"], E::get("/jobs/{id}")),
];

pub(super) static KEYS: &[Operation] = &[
    op("list", &["params", "callback"], E::get("/keys")),
    op("create", &["values", "callback"], E::post("/keys").body(VALUES)),
    op("view", &["key", "callback"], E::get("/keys/{key}")),
    op("update", &["key", "values", "callback"], E::put("/keys/{key}").body(VALUES)),
    op("regenerate", &["key", "callback"], E::post("/keys/{key}/regenerate")),
    op("delete", &["key", "callback"], E::delete("/keys/{key}")),
];

pub(super) static CHARTS: &[Operation] = &[
    op("list", &["params", "callback"], E::get("/charts")),
    op("create", &["values", "callback"], E::post("/charts").body(VALUES)),
    op("view", &["id", "callback"], E::get("/charts/{id}")),
    op("update", &["id", "values", "callback"], E::put("/charts/{id}").body(VALUES)),
    op("delete", &["id", "callback"], E::delete("/charts/{id}")),
    op(
        "render",
        &["id", "format", "params", "callback"],
        E::get("/charts/{id}.{format}"),
    ),
];
