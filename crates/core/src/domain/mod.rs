pub mod conditions;
pub mod product;
pub mod question;
pub mod responses;
pub mod scenario;

pub use conditions::{EligibilityConditions, SpecialCondition};
pub use product::{ChunkType, Product, ProductChunk, ProductCode, ProductDetail, SimpleProduct};
pub use question::{ResponseLog, UserQuestion, UserResponse};
pub use responses::{
    EligibilityErrorResponse, EligibilityRequest, EligibilitySuccessResponse, FilterSummary,
    QuestionErrorResponse, QuestionSuccessResponse, StrategyErrorResponse,
    StrategySuccessResponse,
};
pub use scenario::{ProductAllocation, ProductInterestCalculation, ScenarioDetails, ScenarioType};
