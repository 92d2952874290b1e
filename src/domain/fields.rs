/// Typed mutation paths. Every field change is addressed through one of
/// these variants instead of ad hoc dotted strings; `dotted()` is the single
/// serializer to the storage/log path syntax and `parse()` its inverse.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityField {
    RunningStatus,
    BreakdownStatus,
    Work,
    TargetDate,
    CleanerDid,
    TcDid,
    ClPcbModel,
    TcPcbModel,
}

impl EntityField {
    pub fn column(&self) -> &'static str {
        match self {
            EntityField::RunningStatus => "running_status",
            EntityField::BreakdownStatus => "breakdown_status",
            EntityField::Work => "work",
            EntityField::TargetDate => "target_date",
            EntityField::CleanerDid => "cleaner_did",
            EntityField::TcDid => "tc_did",
            EntityField::ClPcbModel => "cl_pcb_model",
            EntityField::TcPcbModel => "tc_pcb_model",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "running_status" => Some(EntityField::RunningStatus),
            "breakdown_status" => Some(EntityField::BreakdownStatus),
            "work" => Some(EntityField::Work),
            "target_date" => Some(EntityField::TargetDate),
            "cleaner_did" => Some(EntityField::CleanerDid),
            "tc_did" => Some(EntityField::TcDid),
            "cl_pcb_model" => Some(EntityField::ClPcbModel),
            "tc_pcb_model" => Some(EntityField::TcPcbModel),
            _ => None,
        }
    }

    /// Identity fields an operator may edit as free text.
    pub fn is_free_text(&self) -> bool {
        matches!(
            self,
            EntityField::CleanerDid
                | EntityField::TcDid
                | EntityField::ClPcbModel
                | EntityField::TcPcbModel
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartDateField {
    Dispatch,
    Delivery,
}

impl PartDateField {
    pub fn column(&self) -> &'static str {
        match self {
            PartDateField::Dispatch => "dispatch_date",
            PartDateField::Delivery => "delivery_date",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "dispatch_date" => Some(PartDateField::Dispatch),
            "delivery_date" => Some(PartDateField::Delivery),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldPath {
    Entity(EntityField),
    /// Whole part object, `part_issues.<PART>`.
    Part(String),
    /// One date of a part, `part_issues.<PART>.<subfield>`.
    PartDate(String, PartDateField),
}

impl FieldPath {
    pub fn dotted(&self) -> String {
        match self {
            FieldPath::Entity(f) => f.column().to_string(),
            FieldPath::Part(part) => format!("part_issues.{}", part),
            FieldPath::PartDate(part, sub) => format!("part_issues.{}.{}", part, sub.column()),
        }
    }

    pub fn parse(s: &str) -> Option<FieldPath> {
        if let Some(rest) = s.strip_prefix("part_issues.") {
            // Part names may themselves contain no dots, so the first dot
            // after the prefix separates part from subfield.
            return match rest.split_once('.') {
                Some((part, sub)) => {
                    Some(FieldPath::PartDate(part.to_string(), PartDateField::parse(sub)?))
                }
                None if !rest.is_empty() => Some(FieldPath::Part(rest.to_string())),
                None => None,
            };
        }
        EntityField::parse(s).map(FieldPath::Entity)
    }
}
