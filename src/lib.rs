/*!
# Clinic Dashboard

A single-page dashboard for medical-clinic visit records, built in Rust.

## Overview

The page takes one spreadsheet upload (CSV or XLSX), parses it into typed
visit records and shows two summary numbers and five charts. Every upload
fully replaces what was shown before; nothing is stored between uploads.

## Architecture

### Ingestion
- Data URI decoding (`data:<mime>;base64,<payload>`)
- Format selection from the file suffix (`.csv`, `.xlsx`)
- CSV parsing with `csv`, workbook parsing with `calamine`
- Typing of each row into a [`VisitRecord`](record::VisitRecord); missing
  columns and unusable cells are rejected here

### Presentation
- Distinct patient and doctor counts
- Patients by specialty (bar), consultations by doctor (histogram),
  specialty distribution (pie), age distribution (box), consultations over
  time (line, in row order)
- Three render states: no upload ("N/A"), failed upload ("Error"), populated

### Web Layer (feature `web`)
- axum routes for the page, uploads and chart images
- plotters renders chart specifications to PNG

## Modules

- **error**: ingestion error taxonomy
- **record**: typed rows, column resolution, cell conversion
- **loader**: upload decoding and CSV/XLSX parsing
- **chart**: declarative chart specifications
- **dashboard**: the upload-to-dashboard pipeline
- **config**: server settings
- **graph**: PNG rendering of chart specifications
- **app**: routing and handlers

## REST API Endpoints

- `GET /` - The dashboard page
- `GET /api/dashboard` - Dashboard with nothing uploaded
- `POST /api/upload` - JSON `{contents, filename}` upload, returns the dashboard
- `POST /api/upload/file` - Multipart upload (field `file`), returns the dashboard
- `POST /api/chart` - Chart specification in, PNG out
*/

pub mod chart;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod loader;
pub mod record;

#[cfg(feature = "web")]
pub mod app;
#[cfg(feature = "web")]
pub mod graph;

pub use dashboard::{DashboardState, Summary, render};
pub use error::IngestError;
pub use loader::{FileFormat, UploadedFile};
pub use record::{Table, VisitRecord};
