//! User-facing texts.

/// Status shown while the video is being fetched
pub const DOWNLOADING: &str = "Загружаю...";

/// Status shown while the video is being uploaded
pub const SENDING: &str = "Отправляю...";

pub const UNSUPPORTED_HINT: &str = "Пришли ссылку на пост в X (Twitter) или Instagram Reel.";

pub const PRIVATE_CONTENT: &str = "Это приватный аккаунт или пост, доступа к видео нет.";

pub const CONTENT_UNAVAILABLE: &str = "Пост удалён или недоступен.";

pub const NO_VIDEO: &str = "В этом посте нет видео.";

pub const PROCESSING_FAILED: &str = "Не удалось обработать видео. Попробуй другую ссылку.";

pub const DOWNLOAD_FAILED: &str = "Не удалось скачать видео.";

pub const BUSY: &str = "Сейчас слишком много загрузок. Попробуй через пару минут.";

pub const DELIVERY_FAILED: &str = "Не удалось отправить видео. Попробуй позже.";

pub const GENERIC_FAILURE: &str = "Не удалось скачать видео. Попробуй другую ссылку позже.";

pub fn rate_limited(retry_after_secs: u64) -> String {
    format!("Подожди {} сек.", retry_after_secs)
}

pub fn oversize(limit: u64) -> String {
    format!("Видео больше лимита Telegram ({} МБ)", megabytes(limit))
}

/// Greeting for `/start`.
pub fn welcome(max_file_size: u64) -> String {
    format!(
        "Пришли ссылку на X (Twitter) или Instagram Reel, пришлю видео.\nВидео больше {} МБ не поддерживаются.",
        megabytes(max_file_size)
    )
}

fn megabytes(bytes: u64) -> u64 {
    bytes / 1024 / 1024
}
