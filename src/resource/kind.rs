use std::fmt;

/// Declares that a field of a resource payload embeds a list of child
/// records, where their link templates live in the parent's links, and
/// which placeholder each child's `id` fills in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildSpec {
    /// Name the materialized children are stored under
    pub list_name: &'static str,
    /// Key of the template namespace inside the parent's `links`
    pub links_namespace: &'static str,
    /// Field of the parent's `resource` holding the embedded records
    pub response_field: &'static str,
    /// Kind of each materialized child
    pub child_kind: ResourceKind,
    /// Placeholder substituted with the child's `id`
    pub link_id_attr: &'static str,
}

/// The entity types of the publishing workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Revision,
    Source,
    InputSchema,
    OutputSchema,
    Job,
    /// A named set of defaults that revisions can be opened with
    ImportConfig,
    /// Anything without declared children or workflow helpers
    Generic,
}

const SOURCE_CHILDREN: &[ChildSpec] = &[ChildSpec {
    list_name: "input_schemas",
    links_namespace: "input_schema_links",
    response_field: "schemas",
    child_kind: ResourceKind::InputSchema,
    link_id_attr: "input_schema_id",
}];

const INPUT_SCHEMA_CHILDREN: &[ChildSpec] = &[ChildSpec {
    list_name: "output_schemas",
    links_namespace: "output_schema_links",
    response_field: "output_schemas",
    child_kind: ResourceKind::OutputSchema,
    link_id_attr: "output_schema_id",
}];

impl ResourceKind {
    /// Child relationships declared for this kind
    pub fn child_specs(self) -> &'static [ChildSpec] {
        match self {
            ResourceKind::Source => SOURCE_CHILDREN,
            ResourceKind::InputSchema => INPUT_SCHEMA_CHILDREN,
            _ => &[],
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ResourceKind::Revision => "Revision",
            ResourceKind::Source => "Source",
            ResourceKind::InputSchema => "InputSchema",
            ResourceKind::OutputSchema => "OutputSchema",
            ResourceKind::Job => "Job",
            ResourceKind::ImportConfig => "ImportConfig",
            ResourceKind::Generic => "Resource",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
