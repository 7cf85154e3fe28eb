use rhai::Dynamic;

use crate::error::ProbeError;
use crate::introspect::{self, MemberName};
use crate::namespace::Namespace;

/// Raw console input: the whole line and its last whitespace-delimited token.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompletionRequest {
    pub line: String,
    pub last_token: String,
}

impl CompletionRequest {
    pub fn new(line: impl Into<String>, last_token: impl Into<String>) -> Self {
        Self { line: line.into(), last_token: last_token.into() }
    }

    /// Builds a request from arguments a host already split on spaces.
    pub fn from_args<S: AsRef<str>>(args: &[S]) -> Self {
        let line = args.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(" ");
        let last_token = args.last().map(|arg| arg.as_ref().to_string()).unwrap_or_default();
        Self { line, last_token }
    }

    /// Splits typed text the way a console does: the last token is whatever follows the
    /// final space, empty when the text ends in one.
    pub fn from_input(input: &str) -> Self {
        let last_token = input.rsplit(' ').next().unwrap_or_default();
        Self::new(input, last_token)
    }
}

/// Completes the dotted symbol at the end of the line. Each candidate replaces the last token
/// verbatim. Failures while inspecting values are logged and yield no candidates.
pub fn complete(root: &Namespace, request: &CompletionRequest) -> Vec<String> {
    match try_complete(root, request) {
        Ok(candidates) => candidates,
        Err(err) => {
            tracing::warn!(target: "script", "completion of '{}' failed: {err}", request.line);
            Vec::new()
        }
    }
}

pub fn try_complete(root: &Namespace, request: &CompletionRequest) -> Result<Vec<String>, ProbeError> {
    let statement = request.line.trim();
    let globals = rendered(root.visible_members()?);
    if statement.is_empty() {
        return Ok(globals);
    }

    let last_symbol = statement.rsplit(|c: char| !is_symbol_char(c)).next().unwrap_or_default();
    let token = request.last_token.as_str();
    let mut parts = last_symbol.split('.');
    let head = parts.next().unwrap_or_default();

    let Some(start) = root.get(head) else {
        return Ok(globals
            .iter()
            .filter(|name| name.starts_with(last_symbol))
            .map(|name| substitute(token, last_symbol, name))
            .collect());
    };

    let (resolved, pending) = walk(start.clone(), parts);
    let members = rendered(introspect::visible_members(&resolved)?);
    let candidates: Vec<String> = match pending {
        None => members
            .iter()
            .map(|member| substitute(token, last_symbol, &format!("{last_symbol}.{member}")))
            .collect(),
        Some("") => members
            .iter()
            .map(|member| substitute(token, last_symbol, &format!("{last_symbol}{member}")))
            .collect(),
        Some(pending) => {
            let stem = &last_symbol[..last_symbol.rfind(pending).unwrap_or(0)];
            members
                .iter()
                .filter(|member| member.starts_with(pending))
                .map(|member| substitute(token, last_symbol, &format!("{stem}{member}")))
                .collect()
        }
    };
    Ok(candidates)
}

fn is_symbol_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '$' | '_' | '.')
}

fn rendered(members: Vec<MemberName>) -> Vec<String> {
    members.iter().map(ToString::to_string).collect()
}

/// Follows member accesses from `start`. Returns the last value reached and, if the walk
/// stopped early, the name that did not resolve.
fn walk<'a>(start: Dynamic, parts: impl Iterator<Item = &'a str>) -> (Dynamic, Option<&'a str>) {
    let mut current = start;
    for name in parts {
        match introspect::member(&current, name) {
            Some(next) => current = next,
            None => return (current, Some(name)),
        }
    }
    (current, None)
}

/// Replaces `symbol` with `candidate` when the token ends in it. Any other token is returned as is.
fn substitute(token: &str, symbol: &str, candidate: &str) -> String {
    match token.strip_suffix(symbol) {
        Some(stem) => format!("{stem}{candidate}"),
        None => token.to_string(),
    }
}
