use std::sync::Arc;

use futures::TryStreamExt;
use tracing::{debug, info};

use autoshop_auth::{Permission, Principal};
use autoshop_core::{Clock, DomainError, InvoiceId, OrderId, TimeRange};
use autoshop_invoicing::{Invoice, InvoicePatch, NewInvoice, SalesForPeriod, SalesSummary, issue_invoice};

use super::{ServiceResult, found, require};
use crate::store::{InvoiceQuery, ShopStore};

/// Invoice issue, amendment and sales reporting.
pub struct InvoiceService<S: ?Sized> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S: ?Sized> Clone for InvoiceService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<S> InvoiceService<S>
where
    S: ShopStore + ?Sized,
{
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Issue the one invoice for a completed or delivered order.
    ///
    /// The existing-invoice lookup is only a fast reject; two concurrent calls
    /// can both pass it, and the store's uniqueness on the order decides.
    pub async fn create_invoice(&self, actor: &Principal, input: NewInvoice) -> ServiceResult<Invoice> {
        require(actor, &Permission::INVOICES_WRITE)?;

        let order = found(self.store.get_order(input.order_id).await?, "order", input.order_id)?;
        if self.store.invoice_for_order(order.id).await?.is_some() {
            return Err(DomainError::conflict("order already invoiced").into());
        }
        let lines = self.store.line_items(order.id).await?;

        let invoice = issue_invoice(
            &order,
            &lines,
            input.payment_method.as_deref(),
            InvoiceId::new(),
            self.clock.now(),
        )?;
        self.store.insert_invoice(&invoice).await?;

        info!(
            invoice_id = %invoice.id,
            order_id = %order.id,
            total = %invoice.total,
            actor = %actor.principal_id,
            "invoice issued"
        );
        Ok(invoice)
    }

    pub async fn get_invoice(&self, id: InvoiceId) -> ServiceResult<Invoice> {
        found(self.store.get_invoice(id).await?, "invoice", id)
    }

    pub async fn invoice_for_order(&self, order_id: OrderId) -> ServiceResult<Invoice> {
        found(
            self.store.invoice_for_order(order_id).await?,
            "invoice for order",
            order_id,
        )
    }

    pub async fn list_invoices(&self, query: &InvoiceQuery) -> ServiceResult<Vec<Invoice>> {
        debug!(issued = ?query.issued, method = ?query.payment_method, "listing invoices");
        Ok(self.store.list_invoices(query).await?)
    }

    /// Only the payment method changes; amounts are fixed at issue.
    pub async fn update_invoice(
        &self,
        actor: &Principal,
        id: InvoiceId,
        patch: InvoicePatch,
    ) -> ServiceResult<Invoice> {
        require(actor, &Permission::INVOICES_WRITE)?;
        let mut invoice = found(self.store.get_invoice(id).await?, "invoice", id)?;
        patch.apply(&mut invoice)?;
        self.store.update_invoice(&invoice).await?;
        info!(invoice_id = %id, method = %invoice.payment_method, actor = %actor.principal_id, "invoice updated");
        Ok(invoice)
    }

    pub async fn delete_invoice(&self, actor: &Principal, id: InvoiceId) -> ServiceResult<()> {
        require(actor, &Permission::INVOICES_DELETE)?;
        self.store.delete_invoice(id).await?;
        info!(invoice_id = %id, actor = %actor.principal_id, "invoice deleted");
        Ok(())
    }

    /// Totals over all invoices, or those issued in `issued`.
    pub async fn sales_summary(&self, issued: Option<TimeRange>) -> ServiceResult<SalesSummary> {
        let invoices = self
            .store
            .list_invoices(&InvoiceQuery {
                issued,
                ..Default::default()
            })
            .await?;
        Ok(invoices.iter().collect::<SalesSummary>().presented())
    }

    /// Invoices issued in `range`, oldest first, with their totals.
    pub async fn sales_for_period(&self, range: TimeRange) -> ServiceResult<SalesForPeriod> {
        let period = self
            .store
            .invoices_issued(range)
            .try_fold(SalesForPeriod::default(), |mut acc, invoice| async move {
                acc.push(invoice);
                Ok(acc)
            })
            .await?;
        Ok(period.presented())
    }
}
