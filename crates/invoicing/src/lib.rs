//! `autoshop-invoicing`: the invoice generated once from a billable order.

pub mod invoice;
pub mod summary;

pub use invoice::{
    DEFAULT_PAYMENT_METHOD, Invoice, InvoicePatch, InvoiceTotals, NewInvoice, TAX_RATE, issue_invoice,
};
pub use summary::{PaymentMethodTotals, SalesForPeriod, SalesSummary};
