// Graph Nodes Module
// One node per phase of the reasoning loop

pub mod act;
pub mod finalize;
pub mod observe;
pub mod refine;
pub mod synthesize;
pub mod think;
pub mod verify;

pub use act::ActNode;
pub use finalize::FinalizeNode;
pub use observe::ObserveNode;
pub use refine::RefineNode;
pub use synthesize::SynthesizeNode;
pub use think::ThinkNode;
pub use verify::VerifyNode;
