use crate::error::{Result, SwitchyardError};

/// Options for [`normalize`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizeOptions {
    /// Rewrite `:id` and `:<ident>Id` parameters into a digit-constrained
    /// form (`:name(\d+)`), preserving the capture name. Enabled for route
    /// fragments at attachment time; never enabled for the basepath
    /// concatenation at materialization time.
    pub rewrite_params: bool,
}

/// Validates and canonicalizes a route path.
///
/// The path must begin with a slash; `/` itself is returned unchanged.
/// Otherwise the leading run of slashes is collapsed to one and trailing
/// slashes are stripped. A path consisting only of slashes reduces to `/`.
pub fn normalize(path: &str, options: NormalizeOptions) -> Result<String> {
    if !path.starts_with('/') {
        return Err(SwitchyardError::InvalidPath {
            path: path.to_string(),
        });
    }

    if path == "/" {
        return Ok(path.to_string());
    }

    let rewritten = if options.rewrite_params {
        rewrite_numeric_params(path)
    } else {
        path.to_string()
    };

    let collapsed = format!("/{}", rewritten.trim_start_matches('/'));
    let pretty = collapsed.trim_end_matches('/');

    if pretty.is_empty() {
        Ok("/".to_string())
    } else {
        Ok(pretty.to_string())
    }
}

/// Rewrites `:id` and `:<ident>Id` into `:name(\d+)`.
///
/// The `Id` suffix requires at least one preceding word character, so `:Id`
/// is left alone. Rewriting inserts no separators, so the collapse and
/// strip steps in [`normalize`] cannot disturb a rewritten segment.
fn rewrite_numeric_params(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut rest = path;

    while let Some(colon) = rest.find(':') {
        out.push_str(&rest[..=colon]);
        rest = &rest[colon + 1..];

        let end = rest
            .find(|c: char| !c.is_ascii_alphanumeric() && c != '_')
            .unwrap_or(rest.len());
        let name = &rest[..end];

        out.push_str(name);
        if name == "id" || (name.len() > 2 && name.ends_with("Id")) {
            out.push_str("(\\d+)");
        }
        rest = &rest[end..];
    }

    out.push_str(rest);
    out
}

/// Translates a normalized colon-style path into an axum route template.
///
/// `:name` becomes `{name}`; `:name(\d+)` becomes `{name}` and `name` is
/// returned in the list of digit-constrained parameters, which the
/// materializer enforces with a per-route guard.
pub(crate) fn to_axum_path(path: &str) -> (String, Vec<String>) {
    if path == "/" {
        return (path.to_string(), Vec::new());
    }

    let mut constrained = Vec::new();
    let translated = path
        .split('/')
        .map(|segment| match segment.strip_prefix(':') {
            Some(param) if !param.is_empty() => {
                let name = match param.strip_suffix("(\\d+)") {
                    Some(name) => {
                        constrained.push(name.to_string());
                        name
                    }
                    None => param,
                };
                format!("{{{name}}}")
            }
            _ => segment.to_string(),
        })
        .collect::<Vec<_>>()
        .join("/");

    (translated, constrained)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rewrite() -> NormalizeOptions {
        NormalizeOptions {
            rewrite_params: true,
        }
    }

    #[test]
    fn root_is_unchanged() {
        assert_eq!(normalize("/", NormalizeOptions::default()).unwrap(), "/");
    }

    #[test]
    fn collapses_leading_and_strips_trailing() {
        assert_eq!(
            normalize("//dubz//", NormalizeOptions::default()).unwrap(),
            "/dubz"
        );
        assert_eq!(
            normalize("/trailz/", NormalizeOptions::default()).unwrap(),
            "/trailz"
        );
        assert_eq!(normalize("//", NormalizeOptions::default()).unwrap(), "/");
    }

    #[test]
    fn rejects_missing_leading_slash() {
        let err = normalize("noleadingslash", NormalizeOptions::default()).unwrap_err();
        assert!(matches!(err, SwitchyardError::InvalidPath { path } if path == "noleadingslash"));
    }

    #[test]
    fn rewrites_numeric_looking_params() {
        assert_eq!(normalize("/users/:id", rewrite()).unwrap(), "/users/:id(\\d+)");
        assert_eq!(
            normalize("/users/:userId/books/:bookId", rewrite()).unwrap(),
            "/users/:userId(\\d+)/books/:bookId(\\d+)"
        );
    }

    #[test]
    fn leaves_other_params_alone() {
        assert_eq!(
            normalize("/route-parameter/:param", rewrite()).unwrap(),
            "/route-parameter/:param"
        );
        // `Id` needs at least one preceding character.
        assert_eq!(normalize("/things/:Id", rewrite()).unwrap(), "/things/:Id");
        // Without the option nothing is rewritten.
        assert_eq!(
            normalize("/users/:id", NormalizeOptions::default()).unwrap(),
            "/users/:id"
        );
    }

    #[test]
    fn normalized_paths_have_single_leading_separator() {
        for raw in ["/a", "//a", "/a/", "//a//", "/a/b/c/", "///"] {
            let pretty = normalize(raw, NormalizeOptions::default()).unwrap();
            assert!(pretty.starts_with('/'));
            assert!(!pretty.starts_with("//"));
            assert!(pretty == "/" || !pretty.ends_with('/'));
        }
    }

    #[test]
    fn translates_to_axum_templates() {
        let (path, constrained) = to_axum_path("/users/:id(\\d+)");
        assert_eq!(path, "/users/{id}");
        assert_eq!(constrained, vec!["id".to_string()]);

        let (path, constrained) = to_axum_path("/route-parameter/:param");
        assert_eq!(path, "/route-parameter/{param}");
        assert!(constrained.is_empty());

        let (path, constrained) = to_axum_path("/");
        assert_eq!(path, "/");
        assert!(constrained.is_empty());
    }
}
