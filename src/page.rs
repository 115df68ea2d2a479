use axum::response::Html;

pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

const INDEX_HTML: &str = r#"
<!DOCTYPE html>
<html lang="de">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Binnenmarkt Preisdetektiv</title>
    <style>
        * {
            margin: 0;
            padding: 0;
            box-sizing: border-box;
        }

        body {
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, Oxygen, Ubuntu, Cantarell, sans-serif;
            background: linear-gradient(180deg, #eff6ff 0%, #ffffff 100%);
            min-height: 100vh;
            padding: 24px 16px;
        }

        .container {
            max-width: 800px;
            margin: 0 auto;
        }

        header {
            text-align: center;
            margin-bottom: 32px;
        }

        h1 {
            color: #1d4ed8;
            font-size: 2em;
            margin-bottom: 8px;
        }

        .subtitle {
            color: #4b5563;
        }

        main {
            background: white;
            border-radius: 12px;
            box-shadow: 0 10px 30px rgba(0,0,0,0.1);
            padding: 24px;
        }

        .label {
            display: block;
            font-size: 0.9em;
            font-weight: 600;
            color: #374151;
            margin-bottom: 12px;
        }

        .upload-area {
            border: 2px dashed #d1d5db;
            border-radius: 10px;
            padding: 24px;
            text-align: center;
        }

        .preview-image {
            max-width: 100%;
            max-height: 260px;
            object-fit: contain;
            display: none;
            margin: 0 auto 16px;
        }

        .placeholder {
            font-size: 4em;
            color: #9ca3af;
            margin-bottom: 12px;
        }

        .choose {
            display: inline-block;
            color: #2563eb;
            font-weight: 600;
            cursor: pointer;
            padding: 8px 12px;
        }

        input[type="file"] {
            display: none;
        }

        .upload-hint {
            color: #6b7280;
            font-size: 0.8em;
            margin-top: 8px;
        }

        .error {
            background: #fef2f2;
            color: #b91c1c;
            padding: 12px;
            border-radius: 8px;
            margin-top: 16px;
            font-size: 0.9em;
            display: none;
        }

        .actions {
            display: flex;
            justify-content: center;
            gap: 12px;
            margin-top: 20px;
        }

        button {
            padding: 8px 20px;
            border-radius: 6px;
            font-size: 0.9em;
            font-weight: 600;
            cursor: pointer;
        }

        button:disabled {
            opacity: 0.5;
            cursor: not-allowed;
        }

        .primary {
            background: #2563eb;
            color: white;
            border: 1px solid transparent;
            min-width: 120px;
        }

        .secondary {
            background: white;
            color: #374151;
            border: 1px solid #d1d5db;
            display: none;
        }

        .result {
            margin-top: 28px;
            padding: 20px;
            border: 1px solid #e5e7eb;
            border-radius: 10px;
            background: #f9fafb;
            display: none;
        }

        .result h2 {
            font-size: 1.25em;
            color: #111827;
            margin-bottom: 16px;
            word-break: break-word;
        }

        .grid {
            display: grid;
            grid-template-columns: 1fr 1fr;
            gap: 20px;
        }

        @media (max-width: 640px) {
            .grid {
                grid-template-columns: 1fr;
            }
        }

        .row {
            display: flex;
            justify-content: space-between;
            font-size: 0.9em;
            margin-bottom: 8px;
        }

        .row span:first-child {
            color: #4b5563;
        }

        .row span:last-child {
            font-weight: 600;
        }

        .without-eu {
            color: #dc2626;
        }

        .increase {
            color: #2563eb;
        }

        .explanation h3 {
            font-size: 0.9em;
            color: #374151;
            margin-bottom: 8px;
        }

        .explanation p {
            font-size: 0.9em;
            color: #4b5563;
            line-height: 1.5;
        }
    </style>
</head>
<body>
    <div class="container">
        <header>
            <h1>Binnenmarkt Preisdetektiv</h1>
            <p class="subtitle">Laden Sie ein Bild eines Produkts hoch und erfahren Sie, wie viel Sie dank des EU-Binnenmarkts sparen.</p>
        </header>

        <main>
            <form id="form">
                <span class="label">Produkt-Bild hochladen</span>
                <div class="upload-area">
                    <img id="preview" class="preview-image" alt="Hochgeladenes Produkt">
                    <div id="placeholder" class="placeholder">📷</div>
                    <label for="fileInput" class="choose">
                        <span id="chooseText">Bild auswählen</span>
                        <input type="file" id="fileInput" accept="image/*" capture="environment">
                    </label>
                    <p class="upload-hint">PNG, JPG, GIF bis zu 10MB</p>
                </div>

                <div class="error" id="error"></div>

                <div class="actions">
                    <button type="button" class="secondary" id="resetButton">Zurücksetzen</button>
                    <button type="submit" class="primary" id="submitButton" disabled>Analysieren</button>
                </div>
            </form>

            <div class="result" id="result">
                <h2 id="productName"></h2>
                <div class="grid">
                    <div>
                        <div class="row"><span>Aktueller Preis:</span><span id="currentPrice"></span></div>
                        <div class="row"><span>Preis ohne EU-Binnenmarkt:</span><span id="withoutEUPrice" class="without-eu"></span></div>
                        <div class="row"><span>Preisunterschied:</span><span id="priceIncrease" class="increase"></span></div>
                        <div class="row"><span>In der EU produziert:</span><span id="madeInEU"></span></div>
                    </div>
                    <div class="explanation">
                        <h3>Erklärung:</h3>
                        <p id="explanation"></p>
                    </div>
                </div>
            </div>
        </main>
    </div>

    <script>
        const NO_IMAGE = 'Bitte wählen Sie ein Bild aus.';
        const NOT_AN_IMAGE = 'Bitte wählen Sie eine Bilddatei aus.';
        const ANALYSIS_FAILED = 'Fehler bei der Analyse. Bitte versuchen Sie es erneut.';

        const form = document.getElementById('form');
        const fileInput = document.getElementById('fileInput');
        const preview = document.getElementById('preview');
        const placeholder = document.getElementById('placeholder');
        const chooseText = document.getElementById('chooseText');
        const errorDiv = document.getElementById('error');
        const submitButton = document.getElementById('submitButton');
        const resetButton = document.getElementById('resetButton');
        const resultDiv = document.getElementById('result');

        // Empty -> ImageSelected -> Submitting -> Resolved | Failed
        const state = { phase: 'Empty', image: null, analysis: null, error: null };
        let selection = 0;

        function render() {
            const hasImage = state.image !== null;
            preview.style.display = hasImage ? 'block' : 'none';
            placeholder.style.display = hasImage ? 'none' : 'block';
            if (hasImage) {
                preview.src = state.image.dataUrl;
            } else {
                preview.removeAttribute('src');
            }
            chooseText.textContent = hasImage ? 'Anderes Bild wählen' : 'Bild auswählen';

            errorDiv.textContent = state.error || '';
            errorDiv.style.display = state.error ? 'block' : 'none';

            const submitting = state.phase === 'Submitting';
            submitButton.disabled = !hasImage || submitting;
            submitButton.textContent = submitting ? 'Analysiere...' : 'Analysieren';
            resetButton.style.display = hasImage ? 'inline-block' : 'none';

            const a = state.analysis;
            resultDiv.style.display = a ? 'block' : 'none';
            if (a) {
                document.getElementById('productName').textContent = a.productName;
                document.getElementById('currentPrice').textContent = a.currentPrice;
                document.getElementById('withoutEUPrice').textContent = a.withoutEUPrice;
                document.getElementById('priceIncrease').textContent = '+' + a.priceIncrease;
                document.getElementById('madeInEU').textContent =
                    a.madeInEU ? 'Wahrscheinlich ja' : 'Wahrscheinlich nein';
                document.getElementById('explanation').textContent = a.explanation;
            }
        }

        function readAsDataUrl(file) {
            return new Promise((resolve, reject) => {
                const reader = new FileReader();
                reader.onload = () => resolve(reader.result);
                reader.onerror = () => reject(reader.error);
                reader.readAsDataURL(file);
            });
        }

        // Redrawing through a canvas drops EXIF orientation; the browser has
        // already applied it when decoding.
        async function normalizeOrientation(file) {
            let original;
            try {
                original = await readAsDataUrl(file);
            } catch {
                return null;
            }
            try {
                const img = await new Promise((resolve, reject) => {
                    const el = new Image();
                    el.onload = () => resolve(el);
                    el.onerror = reject;
                    el.src = original;
                });
                const canvas = document.createElement('canvas');
                canvas.width = img.naturalWidth;
                canvas.height = img.naturalHeight;
                canvas.getContext('2d').drawImage(img, 0, 0);
                return { dataUrl: canvas.toDataURL('image/jpeg', 0.85), normalized: true };
            } catch {
                return { dataUrl: original, normalized: false };
            }
        }

        fileInput.addEventListener('change', async (e) => {
            const file = e.target.files[0];
            state.error = null;
            state.analysis = null;
            if (!file) {
                state.phase = state.image ? 'ImageSelected' : 'Empty';
                render();
                return;
            }
            if (!file.type.startsWith('image/')) {
                state.phase = state.image ? 'ImageSelected' : 'Empty';
                state.error = NOT_AN_IMAGE;
                render();
                return;
            }
            const token = ++selection;
            const image = await normalizeOrientation(file);
            // a reset or a newer selection happened while reading
            if (token !== selection || fileInput.value === '') {
                return;
            }
            if (image === null) {
                state.phase = state.image ? 'ImageSelected' : 'Empty';
                state.error = NO_IMAGE;
            } else {
                state.image = image;
                state.phase = 'ImageSelected';
            }
            render();
        });

        form.addEventListener('submit', async (e) => {
            e.preventDefault();
            if (state.phase === 'Submitting') {
                return;
            }
            if (!state.image) {
                state.error = NO_IMAGE;
                render();
                return;
            }

            state.phase = 'Submitting';
            state.error = null;
            state.analysis = null;
            render();

            try {
                const blob = await fetch(state.image.dataUrl).then((r) => r.blob());
                const formData = new FormData();
                formData.append('image', blob, 'image');

                const response = await fetch('/api/analyze', {
                    method: 'POST',
                    body: formData
                });
                if (!response.ok) {
                    throw new Error(ANALYSIS_FAILED);
                }

                state.analysis = await response.json();
                state.phase = 'Resolved';
            } catch (error) {
                console.error(error);
                state.error = ANALYSIS_FAILED;
                state.phase = 'Failed';
            } finally {
                render();
            }
        });

        resetButton.addEventListener('click', () => {
            selection++;
            state.phase = 'Empty';
            state.image = null;
            state.analysis = null;
            state.error = null;
            fileInput.value = '';
            render();
        });

        render();
    </script>
</body>
</html>
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_posts_image_field_to_relay() {
        assert!(INDEX_HTML.contains("fetch('/api/analyze'"));
        assert!(INDEX_HTML.contains("formData.append('image'"));
    }

    #[test]
    fn test_page_uses_german_messages() {
        assert!(INDEX_HTML.contains("Bitte wählen Sie ein Bild aus."));
        assert!(INDEX_HTML.contains("Fehler bei der Analyse. Bitte versuchen Sie es erneut."));
        assert!(INDEX_HTML.contains("Zurücksetzen"));
    }

    #[test]
    fn test_submit_disabled_while_in_flight() {
        assert!(INDEX_HTML.contains("submitButton.disabled = !hasImage || submitting"));
        assert!(INDEX_HTML.contains("if (state.phase === 'Submitting') {"));
    }

    #[test]
    fn test_reset_clears_file_input_and_discards_pending_read() {
        let reset = &INDEX_HTML[INDEX_HTML.find("resetButton.addEventListener").unwrap()..];
        assert!(reset.contains("selection++"));
        assert!(reset.contains("fileInput.value = ''"));
        assert!(reset.contains("state.image = null"));
        assert!(INDEX_HTML.contains("if (token !== selection || fileInput.value === '')"));
    }

    #[test]
    fn test_file_read_failure_is_caught() {
        let start = INDEX_HTML.find("async function normalizeOrientation").unwrap();
        let body = &INDEX_HTML[start..];
        let try_at = body.find("try {").unwrap();
        let read_at = body.find("await readAsDataUrl(file)").unwrap();
        assert!(try_at < read_at);
    }
}
