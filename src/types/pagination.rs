use std::collections::HashMap;

use handle_errors::Error;

/// Pagination struct which is getting extracted
/// from query params
#[derive(Default, Debug, PartialEq)]
pub struct Pagination {
    /// The maximum number of items to return, platform default when `None`
    pub limit: Option<u32>,
    /// The index of the first item to return
    pub offset: u32,
}

/// Extract query parameters from the `/api/questions` route
/// # Example query
/// GET requests to this route can have a pagination attached so we just
/// return the questions we need
/// `/api/questions?limit=10&offset=0`
pub fn extract_pagination(params: &HashMap<String, String>) -> Result<Pagination, Error> {
    match (params.get("limit"), params.get("offset")) {
        (Some(limit), Some(offset)) => Ok(Pagination {
            limit: Some(limit.parse::<u32>().map_err(Error::ParseError)?),
            offset: offset.parse::<u32>().map_err(Error::ParseError)?,
        }),
        _ => Err(Error::MissingParameters),
    }
}
