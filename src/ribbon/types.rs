pub use flexstr::SharedStr as FlexStr;

pub type TermId = FlexStr;
pub type TermLabel = FlexStr;
pub type SubjectId = FlexStr;
pub type EvidenceCode = FlexStr;
pub type AspectCode = FlexStr;
pub type TaxonId = FlexStr;
pub type TaxonLabel = FlexStr;
pub type SlimName = FlexStr;
pub type GroupKey = FlexStr;
