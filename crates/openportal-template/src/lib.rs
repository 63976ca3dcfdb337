//! Template resolution for OpenPortal.
//!
//! Action params and datasource params carry `{{ dot.path }}` placeholders
//! that are resolved against a JSON context at execution time:
//!
//! ```json
//! { "url": "/api/users/{{ routeParams.id }}", "body": "{{ state.form }}" }
//! ```
//!
//! A string that is exactly one placeholder resolves to the typed value at
//! that path (`"{{ state.form }}"` stays an object). A placeholder embedded in
//! literal text is substituted by the value's string form. Resolution is
//! best-effort: missing paths become `null` (or an empty string when
//! embedded) and never fail.
//!
//! `when` conditions are small boolean expressions over the same context,
//! evaluated with minijinja (see [`evaluate_when`]).

mod error;
mod path;
mod resolve;
mod when;

pub use error::TemplateError;
pub use path::{PathSegment, lookup_path, parse_path, set_path};
pub use resolve::{
  Placeholder, find_placeholders, has_placeholders, resolve, resolve_map, resolve_str, stringify,
};
pub use when::{evaluate_when, is_truthy, translate_expression};
