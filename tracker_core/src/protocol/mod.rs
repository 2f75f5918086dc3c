/*!
 * Protocol layer: data structures and constants.
 *
 * Everything related to *what* we send to the collector:
 * - `types`: `Event` and the `RequestData` envelope
 * - `constants`: SDK version and configuration defaults
 */

pub mod constants;
pub mod types;
