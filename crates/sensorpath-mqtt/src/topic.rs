//! Splitting a subscription topic into its resource path and query options.

use url::form_urlencoded;

use crate::error::SubscriptionError;

/// A topic with its query options decoded.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TopicRequest {
    /// Resource path, always with a leading `/`.
    pub path: String,
    pub filter: Option<String>,
    pub select: Vec<String>,
}

/// `Things(1)/Datastreams?$filter=name%20eq%20'x'&$select=id,name`
pub fn parse_topic(topic: &str) -> Result<TopicRequest, SubscriptionError> {
    let (path, query) = match topic.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (topic, None),
    };
    let path = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    };

    let mut request = TopicRequest {
        path,
        ..TopicRequest::default()
    };
    for (key, value) in query.map(|q| form_urlencoded::parse(q.as_bytes())).into_iter().flatten() {
        match key.as_ref() {
            "$filter" => request.filter = Some(value.into_owned()),
            "$select" => {
                request.select = value
                    .split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
                    .collect();
            }
            other => {
                return Err(SubscriptionError::UnsupportedOption {
                    topic: topic.to_string(),
                    option: other.to_string(),
                })
            }
        }
    }
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leading_slash_is_optional() {
        assert_eq!(parse_topic("Things(1)").unwrap().path, "/Things(1)");
        assert_eq!(parse_topic("/Things(1)").unwrap().path, "/Things(1)");
    }

    #[test]
    fn query_options_are_decoded() {
        let req = parse_topic(
            "v1.1/Datastreams(1)/Observations?$filter=result%20gt%205&$select=result,%20phenomenonTime",
        )
        .unwrap();
        assert_eq!(req.path, "/v1.1/Datastreams(1)/Observations");
        assert_eq!(req.filter.as_deref(), Some("result gt 5"));
        assert_eq!(req.select, vec!["result", "phenomenonTime"]);
    }

    #[test]
    fn unknown_options_are_rejected() {
        assert!(matches!(
            parse_topic("/Things?$expand=Datastreams"),
            Err(SubscriptionError::UnsupportedOption { ref option, .. }) if option == "$expand"
        ));
    }
}
