//! Backend domain catalog.
//!
//! # Responsibilities
//! - Describe every backend domain once (URL segment, RPC service, method names)
//! - Describe the message fields each domain accepts
//! - Generate fully-qualified RPC method names from a per-domain template
//!
//! # Design Decisions
//! - Method names follow `{Verb}{Entity}`; the list and search targets are
//!   spelled per domain because the backends are not consistent about plurals
//! - Descriptors are `'static` so route entries can borrow them freely

use std::fmt;

use axum::http::Method;

/// Identifier of a backend service (one per domain).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceId(&'static str);

impl ServiceId {
    pub const fn new(id: &'static str) -> Self {
        Self(id)
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// The CRUD + search operations every domain exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    List,
    Search,
    Get,
    Create,
    Update,
    Delete,
}

impl Operation {
    /// Declaration order used when building the route table.
    pub const ALL: [Operation; 6] = [
        Operation::List,
        Operation::Search,
        Operation::Get,
        Operation::Create,
        Operation::Update,
        Operation::Delete,
    ];

    /// HTTP verb the operation is served on.
    pub fn http_method(&self) -> Method {
        match self {
            Operation::List | Operation::Search | Operation::Get => Method::GET,
            Operation::Create => Method::POST,
            Operation::Update => Method::PUT,
            Operation::Delete => Method::DELETE,
        }
    }

    /// Read operations are safe to retry transparently.
    pub fn is_idempotent(&self) -> bool {
        matches!(self, Operation::List | Operation::Search | Operation::Get)
    }

    /// Path suffix appended to `/api/v1/{domain}`.
    pub fn path_suffix(&self) -> &'static str {
        match self {
            Operation::List | Operation::Create => "",
            Operation::Search => "/search",
            Operation::Get | Operation::Update | Operation::Delete => "/{id}",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::List => "list",
            Operation::Search => "search",
            Operation::Get => "get",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

/// JSON kind of a message field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Integer,
    Boolean,
    StringList,
}

/// One field of a domain's create/update message.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    /// Must be present when creating.
    pub required: bool,
}

const fn field(name: &'static str, kind: FieldKind, required: bool) -> FieldSpec {
    FieldSpec { name, kind, required }
}

/// Compact description of one backend domain.
#[derive(Debug)]
pub struct DomainDescriptor {
    /// URL segment under `/api/v1` and service identifier.
    pub segment: &'static str,
    /// Fully-qualified RPC service name.
    pub service: &'static str,
    /// Singular entity name (`Get`, `Create`, `Update`, `Delete`).
    pub entity: &'static str,
    /// Entity name used by `List`.
    pub list_target: &'static str,
    /// Entity name used by `Search`.
    pub search_target: &'static str,
    pub fields: &'static [FieldSpec],
}

impl DomainDescriptor {
    pub fn service_id(&self) -> ServiceId {
        ServiceId::new(self.segment)
    }

    /// Base path of the domain, e.g. `/api/v1/ticket`.
    pub fn base_path(&self) -> String {
        format!("/api/v1/{}", self.segment)
    }

    /// Bare method name, e.g. `ListTickets`.
    pub fn method_name(&self, op: Operation) -> String {
        match op {
            Operation::List => format!("List{}", self.list_target),
            Operation::Search => format!("Search{}", self.search_target),
            Operation::Get => format!("Get{}", self.entity),
            Operation::Create => format!("Create{}", self.entity),
            Operation::Update => format!("Update{}", self.entity),
            Operation::Delete => format!("Delete{}", self.entity),
        }
    }

    /// Fully-qualified method, e.g. `ticket.service.TicketService/ListTickets`.
    pub fn rpc_method(&self, op: Operation) -> String {
        format!("{}/{}", self.service, self.method_name(op))
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }
}

use self::FieldKind::{Boolean, Integer, String as Str, StringList};

/// All domains served by the gateway, in route declaration order.
pub static DOMAINS: &[DomainDescriptor] = &[
    DomainDescriptor {
        segment: "helpdesk",
        service: "helpdesk.service.HelpdeskService",
        entity: "Helpdesk",
        list_target: "Helpdesks",
        search_target: "Helpdesk",
        fields: &[
            field("name", Str, true),
            field("description", Str, false),
            field("email", Str, false),
            field("phone", Str, false),
            field("active", Boolean, false),
        ],
    },
    DomainDescriptor {
        segment: "ticket",
        service: "ticket.service.TicketService",
        entity: "Ticket",
        list_target: "Tickets",
        search_target: "Ticket",
        fields: &[
            field("title", Str, true),
            field("description", Str, false),
            field("helpdesk_id", Str, true),
            field("priority", Str, false),
            field("status", Str, false),
            field("assignee_id", Str, false),
        ],
    },
    DomainDescriptor {
        segment: "issues",
        service: "issues.service.IssuesService",
        entity: "Issue",
        list_target: "Issues",
        search_target: "Issues",
        fields: &[
            field("title", Str, true),
            field("description", Str, false),
            field("ticket_id", Str, false),
            field("severity", Str, false),
            field("status", Str, false),
        ],
    },
    DomainDescriptor {
        segment: "track",
        service: "track.service.TrackService",
        entity: "Track",
        list_target: "Tracks",
        search_target: "Tracks",
        fields: &[
            field("ticket_id", Str, true),
            field("status", Str, true),
            field("note", Str, false),
        ],
    },
    DomainDescriptor {
        segment: "network",
        service: "network.service.NetworkService",
        entity: "Network",
        list_target: "Networks",
        search_target: "Networks",
        fields: &[
            field("name", Str, true),
            field("cidr", Str, false),
            field("gateway", Str, false),
            field("vlan", Integer, false),
            field("description", Str, false),
        ],
    },
    DomainDescriptor {
        segment: "faq",
        service: "faq.service.FAQService",
        entity: "FAQ",
        list_target: "FAQs",
        search_target: "FAQs",
        fields: &[
            field("question", Str, true),
            field("answer", Str, true),
            field("category", Str, false),
            field("tags", StringList, false),
            field("published", Boolean, false),
        ],
    },
];

/// Look up a domain by its URL segment.
pub fn find_domain(segment: &str) -> Option<&'static DomainDescriptor> {
    DOMAINS.iter().find(|d| d.segment == segment)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_names_follow_backend_spelling() {
        let helpdesk = find_domain("helpdesk").unwrap();
        assert_eq!(
            helpdesk.rpc_method(Operation::List),
            "helpdesk.service.HelpdeskService/ListHelpdesks"
        );
        assert_eq!(
            helpdesk.rpc_method(Operation::Search),
            "helpdesk.service.HelpdeskService/SearchHelpdesk"
        );

        let faq = find_domain("faq").unwrap();
        assert_eq!(faq.rpc_method(Operation::Get), "faq.service.FAQService/GetFAQ");
        assert_eq!(faq.rpc_method(Operation::Search), "faq.service.FAQService/SearchFAQs");

        let issues = find_domain("issues").unwrap();
        assert_eq!(issues.rpc_method(Operation::Delete), "issues.service.IssuesService/DeleteIssue");
    }

    #[test]
    fn test_every_domain_has_a_required_field() {
        for domain in DOMAINS {
            assert!(
                domain.fields.iter().any(|f| f.required),
                "{} has no required create field",
                domain.segment
            );
        }
    }

    #[test]
    fn test_only_reads_are_idempotent() {
        let idempotent: Vec<_> = Operation::ALL.iter().filter(|op| op.is_idempotent()).collect();
        assert_eq!(idempotent, vec![&Operation::List, &Operation::Search, &Operation::Get]);
    }
}
