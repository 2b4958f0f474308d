//! Table and column names shared by the cleaning stage and the star schema.

// Tables
pub const DIM_DATE: &str = "Dim_Date";
pub const DIM_CUSTOMER: &str = "Dim_Customer";
pub const DIM_PRODUCT: &str = "Dim_Product";
pub const FACT_INVOICE: &str = "Fact_Invoice";

// Cleaned record columns
pub const INVOICE: &str = "Invoice";
pub const INVOICE_DATE: &str = "InvoiceDate";
pub const CUSTOMER_ID: &str = "Customer ID";
pub const COUNTRY: &str = "Country";
pub const STOCK_CODE: &str = "StockCode";
pub const DESCRIPTION: &str = "Description";
pub const PRICE: &str = "Price";
pub const QUANTITY: &str = "Quantity";

// Dimension columns
pub const DATE_KEY: &str = "DateKey";
pub const CUSTOMER_KEY: &str = "CustomerKey";
pub const CUSTOMER_NATURAL_KEY: &str = "CustomerID";
pub const PRODUCT_KEY: &str = "ProductKey";
pub const PRODUCT_NATURAL_KEY: &str = "ProductID";
pub const YEAR: &str = "Year";
pub const QUARTER: &str = "Quarter";
pub const MONTH: &str = "Month";
pub const DAY: &str = "Day";
pub const WEEKDAY: &str = "Weekday";
