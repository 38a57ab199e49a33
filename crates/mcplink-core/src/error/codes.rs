//! JSON-RPC and MCP error codes.

/// Invalid JSON was received.
pub const PARSE_ERROR: i32 = -32700;

/// The JSON sent is not a valid Request object.
pub const INVALID_REQUEST: i32 = -32600;

/// The method does not exist.
pub const METHOD_NOT_FOUND: i32 = -32601;

/// Invalid method parameters.
pub const INVALID_PARAMS: i32 = -32602;

/// Internal JSON-RPC error.
pub const INTERNAL_ERROR: i32 = -32603;

/// Server error range start.
pub const SERVER_ERROR_START: i32 = -32000;

/// Server error range end.
pub const SERVER_ERROR_END: i32 = -32099;

/// Resource was not found.
pub const RESOURCE_NOT_FOUND: i32 = -32002;

/// Request was cancelled before a response arrived.
pub const REQUEST_CANCELLED: i32 = -32800;

/// Returns `true` if `code` lies in the implementation-defined server range.
#[must_use]
pub const fn is_server_error(code: i32) -> bool {
    code <= SERVER_ERROR_START && code >= SERVER_ERROR_END
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_error_range() {
        assert!(is_server_error(SERVER_ERROR_START));
        assert!(is_server_error(RESOURCE_NOT_FOUND));
        assert!(is_server_error(SERVER_ERROR_END));
        assert!(!is_server_error(METHOD_NOT_FOUND));
        assert!(!is_server_error(-31999));
    }
}
