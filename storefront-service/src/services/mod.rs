pub mod cart;
pub mod checkout;
pub mod email;
pub mod inventory;
pub mod metrics;
pub mod razorpay;
pub mod reconciliation;
pub mod repository;

pub use cart::{recompute_total, CartService};
pub use checkout::CheckoutService;
pub use email::EmailService;
pub use inventory::InventoryService;
pub use metrics::{get_metrics, init_metrics};
pub use razorpay::RazorpayClient;
pub use reconciliation::{CompletionOutcome, ReconciliationEngine};
pub use repository::StoreRepository;
