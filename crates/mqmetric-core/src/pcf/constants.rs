//! Numeric identifiers used by the queue manager's programmable command format.
//!
//! Values are the server's wire values and must not be renumbered.

// Completion codes.
pub const MQCC_OK: i32 = 0;
pub const MQCC_WARNING: i32 = 1;
pub const MQCC_FAILED: i32 = 2;

// Reason codes the core reacts to.
pub const MQRC_NONE: i32 = 0;
pub const MQRC_HOBJ_ERROR: i32 = 2019;
pub const MQRC_NO_MSG_AVAILABLE: i32 = 2033;
pub const MQRC_TRUNCATED_MSG_FAILED: i32 = 2080;
pub const MQRC_NOT_AUTHORIZED: i32 = 2035;
pub const MQRC_CONNECTION_BROKEN: i32 = 2009;

// Header control flag.
pub const MQCFC_NOT_LAST: i32 = 0;
pub const MQCFC_LAST: i32 = 1;

// Structure (parameter) types.
pub const MQCFT_COMMAND: i32 = 1;
pub const MQCFT_RESPONSE: i32 = 2;
pub const MQCFT_INTEGER: i32 = 3;
pub const MQCFT_STRING: i32 = 4;
pub const MQCFT_INTEGER_LIST: i32 = 5;
pub const MQCFT_STRING_LIST: i32 = 6;
pub const MQCFT_BYTE_STRING: i32 = 9;
pub const MQCFT_COMMAND_XR: i32 = 16;
pub const MQCFT_GROUP: i32 = 20;
pub const MQCFT_STATISTICS: i32 = 21;
pub const MQCFT_INTEGER64: i32 = 23;
pub const MQCFT_INTEGER64_LIST: i32 = 25;

// Commands.
pub const MQCMD_INQUIRE_Q: i32 = 13;
pub const MQCMD_INQUIRE_Q_NAMES: i32 = 18;
pub const MQCMD_INQUIRE_CHANNEL_NAMES: i32 = 20;

// Object types.
pub const MQOT_Q: i32 = 1;
pub const MQOT_CHANNEL: i32 = 6;

// Queue types and definition types.
pub const MQQT_LOCAL: i32 = 1;
pub const MQQDT_PREDEFINED: i32 = 1;
pub const MQQDT_PERMANENT_DYNAMIC: i32 = 2;
pub const MQQDT_TEMPORARY_DYNAMIC: i32 = 3;
pub const MQQDT_SHARED_DYNAMIC: i32 = 4;

// Integer attributes.
pub const MQIA_DEFINITION_TYPE: i32 = 7;
pub const MQIA_USAGE: i32 = 12;
pub const MQIA_MAX_Q_DEPTH: i32 = 15;
pub const MQIA_Q_TYPE: i32 = 20;
pub const MQIACF_Q_ATTRS: i32 = 1002;
pub const MQIACF_OBJECT_TYPE: i32 = 1016;

// String attributes.
pub const MQCA_Q_MGR_NAME: i32 = 2015;
pub const MQCA_Q_NAME: i32 = 2016;
pub const MQCA_TOPIC_NAME: i32 = 2092;
pub const MQCA_TOPIC_STRING: i32 = 2094;
pub const MQCACF_Q_NAMES: i32 = 3011;
pub const MQCACH_CHANNEL_NAME: i32 = 3501;
pub const MQCACH_CHANNEL_NAMES: i32 = 3512;

// Monitoring metadata and publication fields.
pub const MQIAMO_MONITOR_CLASS: i32 = 839;
pub const MQIAMO_MONITOR_TYPE: i32 = 840;
pub const MQIAMO_MONITOR_ELEMENT: i32 = 841;
pub const MQIAMO_MONITOR_DATATYPE: i32 = 842;
pub const MQIAMO_MONITOR_FLAGS: i32 = 843;
pub const MQIAMO64_MONITOR_INTERVAL: i32 = 845;
pub const MQCAMO_MONITOR_CLASS: i32 = 2713;
pub const MQCAMO_MONITOR_TYPE: i32 = 2714;
pub const MQCAMO_MONITOR_DESC: i32 = 2715;

// Monitor element datatypes.
pub const MQIAMO_MONITOR_UNIT: i32 = 1;
pub const MQIAMO_MONITOR_DELTA: i32 = 2;
pub const MQIAMO_MONITOR_HUNDREDTHS: i32 = 100;
pub const MQIAMO_MONITOR_KB: i32 = 1024;
pub const MQIAMO_MONITOR_PERCENT: i32 = 10000;
pub const MQIAMO_MONITOR_MICROSEC: i32 = 1_000_000;
pub const MQIAMO_MONITOR_MB: i32 = 1_048_576;
pub const MQIAMO_MONITOR_GB: i32 = 100_000_000;

// Inquiry failure reason codes.
pub const MQRC_UNKNOWN_OBJECT_NAME: i32 = 2085;
pub const MQRC_UNEXPECTED_ERROR: i32 = 2195;

// Metadata group parameters.
pub const MQGACF_MONITOR_CLASS: i32 = 8029;
pub const MQGACF_MONITOR_TYPE: i32 = 8030;
pub const MQGACF_MONITOR_ELEMENT: i32 = 8031;
