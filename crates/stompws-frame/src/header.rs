//! Well-known header names.

/// CONNECT: versions the client speaks.
pub const ACCEPT_VERSION: &str = "accept-version";

/// CONNECT: virtual host to connect to.
pub const HOST: &str = "host";

/// CONNECTED: negotiated protocol version.
pub const VERSION: &str = "version";

/// CONNECT: user identifier.
pub const LOGIN: &str = "login";

/// CONNECT: password.
pub const PASSCODE: &str = "passcode";

/// CONNECT/CONNECTED: heart-beat settings.
pub const HEART_BEAT: &str = "heart-beat";

/// CONNECTED: server name and version.
pub const SERVER: &str = "server";

/// CONNECTED: session identifier.
pub const SESSION: &str = "session";

/// SEND/SUBSCRIBE/MESSAGE: target topic or queue.
pub const DESTINATION: &str = "destination";

/// SUBSCRIBE/UNSUBSCRIBE: client subscription id.
pub const ID: &str = "id";

/// MESSAGE: subscription id the message is delivered for.
pub const SUBSCRIPTION: &str = "subscription";

/// MESSAGE: server message id.
pub const MESSAGE_ID: &str = "message-id";

/// Any client frame: ask the server for a RECEIPT.
pub const RECEIPT: &str = "receipt";

/// RECEIPT: the receipt being acknowledged.
pub const RECEIPT_ID: &str = "receipt-id";

/// ERROR: short error description.
pub const MESSAGE: &str = "message";

pub const CONTENT_TYPE: &str = "content-type";

pub const CONTENT_LENGTH: &str = "content-length";
