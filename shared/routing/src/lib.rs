//! Path based route table.
//!
//! Routes are matched on the request path only. Host and method are not
//! consulted, so any verb reaching a registered path resolves to its action.

#[derive(Debug, Clone, PartialEq, Eq)]
struct Path {
    segments: Vec<String>,
}

impl Path {
    /// Parses a path pattern such as "/transactions/authorize.xml".
    /// Leading and trailing slashes are ignored.
    fn parse(path_str: &str) -> Self {
        Path {
            segments: split_segments(path_str).map(String::from).collect(),
        }
    }

    fn matches(&self, request_path: &str) -> bool {
        let mut request_segments = split_segments(request_path);
        self.segments
            .iter()
            .all(|seg| request_segments.next() == Some(seg.as_str()))
            && request_segments.next().is_none()
    }
}

fn split_segments(path: &str) -> impl Iterator<Item = &str> {
    path.trim()
        .trim_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
}

#[derive(Debug)]
pub struct Route<A> {
    path: Path,
    action: A,
}

impl<A> Route<A> {
    pub fn new(path: &str, action: A) -> Self {
        Self {
            path: Path::parse(path),
            action,
        }
    }

    /// Returns the action if `request_path` matches this route.
    /// Trailing slash normalization is applied to incoming requests.
    pub fn matches(&self, request_path: &str) -> Option<&A> {
        self.path.matches(request_path).then_some(&self.action)
    }
}

#[derive(Debug)]
pub struct RouteActions<A> {
    routes: Vec<Route<A>>,
}

impl<A> RouteActions<A> {
    pub fn new(routes: Vec<Route<A>>) -> Self {
        Self { routes }
    }

    /// Returns the action of the first route matching the request path, if any.
    pub fn resolve<B>(&self, request: &http::Request<B>) -> Option<&A> {
        self.resolve_path(request.uri().path())
    }

    pub fn resolve_path(&self, path: &str) -> Option<&A> {
        self.routes.iter().find_map(|route| route.matches(path))
    }
}
